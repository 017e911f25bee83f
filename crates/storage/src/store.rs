//! The object storage trait.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Opaque blob storage with public URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `content` under `key`, returning the public URL.
    async fn upload(
        &self,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Delete the object under `key`.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// The public URL an object under `key` would be served from.
    fn public_url(&self, key: &str) -> String;
}
