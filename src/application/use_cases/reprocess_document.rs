use std::sync::Arc;

use tracing::info;

use crate::domain::repositories::{DocumentRepository, DocumentRepositoryError};
use crate::infrastructure::messaging::Enqueuer;

#[derive(Debug)]
pub enum ReprocessError {
    NotFound(i32),
    ConflictingState(String),
    RepositoryError(String),
    QueueError(String),
}

impl std::fmt::Display for ReprocessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReprocessError::NotFound(id) => write!(f, "Document not found: {}", id),
            ReprocessError::ConflictingState(msg) => write!(f, "Conflicting state: {}", msg),
            ReprocessError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
            ReprocessError::QueueError(msg) => write!(f, "Queue error: {}", msg),
        }
    }
}

impl std::error::Error for ReprocessError {}

#[derive(Debug, Clone)]
pub struct ReprocessDocumentResponse {
    pub success: bool,
    pub document_id: i32,
}

/// Clears derived fields and queues another processing run. Rejected with
/// a conflict while a worker holds the lease; idempotent otherwise. The
/// facet cache stays put until the reprocess completes.
pub struct ReprocessDocumentUseCase {
    documents: Arc<dyn DocumentRepository>,
    enqueuer: Arc<Enqueuer>,
}

impl ReprocessDocumentUseCase {
    pub fn new(documents: Arc<dyn DocumentRepository>, enqueuer: Arc<Enqueuer>) -> Self {
        Self {
            documents,
            enqueuer,
        }
    }

    pub async fn execute(
        &self,
        document_id: i32,
    ) -> Result<ReprocessDocumentResponse, ReprocessError> {
        match self.documents.find_by_id(document_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ReprocessError::NotFound(document_id)),
            Err(err) => return Err(ReprocessError::RepositoryError(err.to_string())),
        }

        match self.documents.reset_for_reprocessing(document_id).await {
            Ok(()) => {}
            Err(DocumentRepositoryError::ConflictingState(msg)) => {
                return Err(ReprocessError::ConflictingState(msg));
            }
            Err(DocumentRepositoryError::NotFound(id)) => {
                return Err(ReprocessError::NotFound(id));
            }
            Err(err) => return Err(ReprocessError::RepositoryError(err.to_string())),
        }

        self.enqueuer
            .enqueue_document(document_id, 0)
            .await
            .map_err(|e| ReprocessError::QueueError(e.to_string()))?;

        info!(document_id, "Document queued for reprocessing");
        Ok(ReprocessDocumentResponse {
            success: true,
            document_id,
        })
    }
}
