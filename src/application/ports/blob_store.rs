use async_trait::async_trait;

#[derive(Debug)]
pub enum BlobStoreError {
    BlobMissing(String),
    InvalidKey(String),
    IoError(String),
}

impl std::fmt::Display for BlobStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobStoreError::BlobMissing(key) => write!(f, "Blob missing: {}", key),
            BlobStoreError::InvalidKey(key) => write!(f, "Invalid blob key: {}", key),
            BlobStoreError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for BlobStoreError {}

/// Opaque content storage. Keys are uuid-prefixed and must never be
/// interpreted as filesystem paths by callers; keys containing traversal
/// sequences are rejected outright.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, BlobStoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError>;

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError>;

    /// A time-limited direct URL, when the backend can mint one. Local
    /// storage cannot; callers fall back to streaming.
    async fn presigned_get(&self, key: &str, ttl_s: u64) -> Result<Option<String>, BlobStoreError>;
}

/// Shared key hygiene for implementations.
pub fn validate_key(key: &str) -> Result<(), BlobStoreError> {
    if key.is_empty()
        || key.contains("..")
        || key.contains('\0')
        || key.starts_with('/')
        || key.contains('\\')
    {
        return Err(BlobStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
