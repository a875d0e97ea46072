//! Filesystem-backed object store for development and tests

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::errors::BerthError;
use crate::object::ObjectStore;

/// Object store rooted at a local directory; keys map to relative paths
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, BerthError> {
        // Keys are produced internally, but reject traversal anyway.
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return Err(BerthError::StorageError(format!("invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<(), BerthError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, body).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), BerthError> {
        let path = self.resolve(prefix)?;
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store
            .put("outputs/acme/assets/app.js", b"content".to_vec(), "text/javascript")
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("outputs/acme/assets/app.js")).unwrap();
        assert_eq!(written, b"content");
    }

    #[tokio::test]
    async fn test_delete_prefix_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        // Nothing there yet: still Ok.
        store.delete_prefix("outputs/acme").await.unwrap();

        store
            .put("outputs/acme/index.html", b"<html>".to_vec(), "text/html")
            .await
            .unwrap();
        store.delete_prefix("outputs/acme").await.unwrap();
        assert!(!dir.path().join("outputs/acme").exists());

        // And again after it is gone.
        store.delete_prefix("outputs/acme").await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let err = store
            .put("../escape", b"x".to_vec(), "application/octet-stream")
            .await
            .unwrap_err();
        assert!(matches!(err, BerthError::StorageError(_)));
    }
}
