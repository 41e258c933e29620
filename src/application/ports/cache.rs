use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug)]
pub enum CacheError {
    Unavailable(String),
    SerializationError(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Unavailable(msg) => write!(f, "Cache unavailable: {}", msg),
            CacheError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug, Clone)]
pub struct CacheHealth {
    pub ok: bool,
    pub latency_ms: u64,
}

/// Short-lived keyed storage with TTLs. Read paths must degrade to a
/// recompute when the backend is unreachable; unavailability never fails
/// a query.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError>;

    /// Remaining lifetime of a key, if it exists and carries a TTL.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    async fn health(&self) -> CacheHealth;
}
