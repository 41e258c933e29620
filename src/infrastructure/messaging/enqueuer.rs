use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::application::ports::job_queue::{JobQueue, ProcessJobPayload, PROCESS_QUEUE};
use crate::domain::repositories::DocumentRepository;
use crate::domain::value_objects::DocumentStatus;

#[derive(Debug)]
pub enum EnqueueError {
    Backpressure { depth: usize, watermark: usize },
    QueueError(String),
    RepositoryError(String),
}

impl std::fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueError::Backpressure { depth, watermark } => {
                write!(
                    f,
                    "Queue depth {} exceeds watermark {}; rejecting new work",
                    depth, watermark
                )
            }
            EnqueueError::QueueError(msg) => write!(f, "Queue error: {}", msg),
            EnqueueError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for EnqueueError {}

/// Feeds the processing queue: once on upload, and again from the
/// periodic sweep for documents that never made it out of PENDING or
/// QUEUED.
pub struct Enqueuer {
    documents: Arc<dyn DocumentRepository>,
    queue: Arc<dyn JobQueue>,
    depth_watermark: usize,
    batch_stagger: Duration,
    stuck_threshold: Duration,
}

impl Enqueuer {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        queue: Arc<dyn JobQueue>,
        depth_watermark: usize,
        batch_stagger: Duration,
        stuck_threshold: Duration,
    ) -> Self {
        Self {
            documents,
            queue,
            depth_watermark,
            batch_stagger,
            stuck_threshold,
        }
    }

    /// Reject new uploads once the queue is saturated.
    pub async fn check_backpressure(&self) -> Result<(), EnqueueError> {
        let depth = self
            .queue
            .depth(PROCESS_QUEUE)
            .await
            .map_err(|e| EnqueueError::QueueError(e.to_string()))?;
        if depth > self.depth_watermark {
            return Err(EnqueueError::Backpressure {
                depth,
                watermark: self.depth_watermark,
            });
        }
        Ok(())
    }

    /// Enqueue one document. `batch_index` staggers successive jobs of an
    /// upload batch to space out provider load.
    pub async fn enqueue_document(
        &self,
        document_id: i32,
        batch_index: usize,
    ) -> Result<String, EnqueueError> {
        let payload = serde_json::to_vec(&ProcessJobPayload { document_id })
            .map_err(|e| EnqueueError::QueueError(e.to_string()))?;

        let eta = if batch_index == 0 {
            None
        } else {
            let delay = self.batch_stagger * batch_index as u32;
            Some(
                Utc::now()
                    + chrono::Duration::from_std(delay)
                        .unwrap_or_else(|_| chrono::Duration::seconds(0)),
            )
        };

        let job_id = self
            .queue
            .enqueue(PROCESS_QUEUE, &payload, eta)
            .await
            .map_err(|e| EnqueueError::QueueError(e.to_string()))?;

        self.documents
            .update_status(document_id, DocumentStatus::Queued, Some(0), None)
            .await
            .map_err(|e| EnqueueError::RepositoryError(e.to_string()))?;

        info!(document_id, job_id = %job_id, "Document queued for processing");
        Ok(job_id)
    }

    /// Re-enqueue documents stuck in PENDING or QUEUED beyond the
    /// threshold. Idempotent: a duplicate delivery only re-runs an
    /// already-completed pipeline step guarded by the status machine.
    pub async fn sweep_stuck(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.stuck_threshold)
                .unwrap_or_else(|_| chrono::Duration::minutes(10));

        let stale = match self
            .documents
            .find_stale(&[DocumentStatus::Pending, DocumentStatus::Queued], cutoff)
            .await
        {
            Ok(stale) => stale,
            Err(err) => {
                warn!(error = %err, "Stuck-document sweep failed");
                return 0;
            }
        };

        let mut requeued = 0;
        for document in stale {
            match self.enqueue_document(document.id(), 0).await {
                Ok(_) => requeued += 1,
                Err(err) => {
                    warn!(document_id = document.id(), error = %err, "Failed to re-enqueue stuck document");
                }
            }
        }

        if requeued > 0 {
            info!(count = requeued, "Re-enqueued stuck documents");
        }
        requeued
    }
}
