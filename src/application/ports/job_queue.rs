use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug)]
pub enum JobQueueError {
    Unavailable(String),
    SerializationError(String),
    UnknownJob(String),
}

impl std::fmt::Display for JobQueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobQueueError::Unavailable(msg) => write!(f, "Job queue unavailable: {}", msg),
            JobQueueError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            JobQueueError::UnknownJob(id) => write!(f, "Unknown job: {}", id),
        }
    }
}

impl std::error::Error for JobQueueError {}

/// Payload of a document-processing job. The attempt counter rides on the
/// job record and is incremented by the broker on every `nack`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessJobPayload {
    pub document_id: i32,
}

#[derive(Debug, Clone)]
pub struct ReservedJob {
    pub job_id: String,
    pub payload: Vec<u8>,
    pub attempts: u32,
}

/// At-most-one delivery within the visibility window: a reserved job is
/// invisible to other workers until acked, nacked, or its lease expires.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Durable once this returns. `eta` delays first delivery.
    async fn enqueue(
        &self,
        queue: &str,
        payload: &[u8],
        eta: Option<DateTime<Utc>>,
    ) -> Result<String, JobQueueError>;

    async fn reserve(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<ReservedJob>, JobQueueError>;

    async fn ack(&self, queue: &str, job_id: &str) -> Result<(), JobQueueError>;

    /// Reschedule after `retry_after`, bumping the attempt counter.
    async fn nack(
        &self,
        queue: &str,
        job_id: &str,
        reason: &str,
        retry_after: Duration,
    ) -> Result<(), JobQueueError>;

    /// Ready + delayed depth, for the backpressure watermark.
    async fn depth(&self, queue: &str) -> Result<usize, JobQueueError>;

    /// Return lease-expired jobs to the ready state. Called by the
    /// scheduler tick.
    async fn requeue_expired(&self, queue: &str) -> Result<usize, JobQueueError>;
}

/// Queue name for document processing jobs.
pub const PROCESS_QUEUE: &str = "job:documents:process";

/// Exponential backoff for job retries: `min(2^attempts * base, cap)`.
pub fn retry_backoff(attempts: u32, base: Duration, cap: Duration) -> Duration {
    let exp = attempts.min(16);
    let scaled = base.saturating_mul(1u32 << exp);
    scaled.min(cap)
}
