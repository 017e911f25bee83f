//! Filesystem-backed object store for local runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;
use crate::store::ObjectStore;

/// An object store rooted at a local directory.
///
/// Keys map to relative paths; content types are not persisted (the
/// extension carries them). URLs are `file://` paths under the root.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created on
    /// first upload.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == ".." || segment.is_empty())
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn upload(
        &self,
        key: &str,
        content: Bytes,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &content).await?;
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        collect_keys(&self.root, &self.root, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn public_url(&self, key: &str) -> String {
        format!("file://{}", self.root.join(key).display())
    }
}

/// Walk `dir` recursively, pushing keys relative to `root`.
fn collect_keys(root: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<(), StorageError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_keys(root, &path, keys)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            keys.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn upload_writes_file_and_returns_url() {
        let (dir, store) = store();
        let url = store
            .upload("runs/1/report.json", Bytes::from_static(b"{}"), "application/json")
            .await
            .unwrap();

        assert!(url.starts_with("file://"));
        let on_disk = std::fs::read(dir.path().join("runs/1/report.json")).unwrap();
        assert_eq!(on_disk, b"{}");
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let (_dir, store) = store();
        store
            .upload("a.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        store.delete("a.txt").await.unwrap();
        let err = store.delete("a.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_returns_relative_keys_under_prefix() {
        let (_dir, store) = store();
        for key in ["runs/1/a.png", "runs/2/b.png", "misc/c.png"] {
            store
                .upload(key, Bytes::from_static(b"x"), "image/png")
                .await
                .unwrap();
        }
        let keys = store.list("runs/").await.unwrap();
        assert_eq!(keys, vec!["runs/1/a.png", "runs/2/b.png"]);
    }

    #[tokio::test]
    async fn list_on_missing_root_is_empty() {
        let store = FsStore::new("/tmp/quasar-does-not-exist-anywhere");
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store();
        let err = store
            .upload("../escape.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));

        let err = store
            .upload("/absolute.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
