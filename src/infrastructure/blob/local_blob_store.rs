use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::application::ports::blob_store::{validate_key, BlobStore, BlobStoreError};

/// Key-addressed storage on the local filesystem. Keys stay opaque to
/// callers; internally a key maps to a path under the base directory,
/// after traversal screening.
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// `uploads/{uuid}/{filename}` style keys for new uploads.
    pub fn make_key(prefix: &str, filename: &str) -> String {
        format!("{}/{}/{}", prefix, Uuid::new_v4(), filename)
    }

    async fn ensure_parent_exists(&self, path: &PathBuf) -> Result<(), BlobStoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobStoreError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobStoreError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<String, BlobStoreError> {
        let path = self.path_for(key)?;
        self.ensure_parent_exists(&path).await?;

        fs::write(&path, data)
            .await
            .map_err(|e| BlobStoreError::IoError(e.to_string()))?;

        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.path_for(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::BlobMissing(key.to_string()))
            }
            Err(e) => Err(BlobStoreError::IoError(e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobStoreError::IoError(e.to_string())),
        }
    }

    async fn presigned_get(
        &self,
        _key: &str,
        _ttl_s: u64,
    ) -> Result<Option<String>, BlobStoreError> {
        // Local storage has no presigner; callers stream instead.
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let (_dir, store) = store();
        let key = LocalBlobStore::make_key("uploads", "report.pdf");

        store.put(&key, b"pdf bytes", "application/pdf").await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), b"pdf bytes");
    }

    #[tokio::test]
    async fn test_missing_blob_is_distinct_error() {
        let (_dir, store) = store();
        let result = store.get("uploads/none/missing.pdf").await;
        assert!(matches!(result, Err(BlobStoreError::BlobMissing(_))));
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let (_dir, store) = store();
        let result = store.put("../escape.bin", b"x", "application/octet-stream").await;
        assert!(matches!(result, Err(BlobStoreError::InvalidKey(_))));

        let result = store.get("uploads/../../etc/passwd").await;
        assert!(matches!(result, Err(BlobStoreError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        let key = LocalBlobStore::make_key("uploads", "a.txt");
        store.put(&key, b"x", "text/plain").await.unwrap();

        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_presigned_get_unsupported() {
        let (_dir, store) = store();
        assert_eq!(store.presigned_get("uploads/a", 600).await.unwrap(), None);
    }
}
