//! Map-backed object store for tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::StorageError;
use crate::store::ObjectStore;

/// An object store holding everything in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    base_url: String,
    objects: RwLock<BTreeMap<String, (Bytes, String)>>,
}

impl MemoryStore {
    /// Create a store minting URLs under `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// The stored bytes and content type for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.read().get(key).cloned()
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns `true` when the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("https://storage.invalid")
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(
        &self,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects
            .write()
            .insert(key.to_string(), (content, content_type.to_string()));
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}
