use std::sync::Arc;

use tracing::{info, warn};

use crate::application::ports::BlobStore;
use crate::application::services::search_service::SearchService;
use crate::domain::repositories::DocumentRepository;

#[derive(Debug)]
pub enum DeleteDocumentError {
    NotFound(i32),
    RepositoryError(String),
}

impl std::fmt::Display for DeleteDocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteDocumentError::NotFound(id) => write!(f, "Document not found: {}", id),
            DeleteDocumentError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for DeleteDocumentError {}

/// Removes a document. The store cascades the taxonomy map; blob and
/// preview deletion is best-effort.
pub struct DeleteDocumentUseCase {
    documents: Arc<dyn DocumentRepository>,
    blobs: Arc<dyn BlobStore>,
    search: Arc<SearchService>,
}

impl DeleteDocumentUseCase {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        blobs: Arc<dyn BlobStore>,
        search: Arc<SearchService>,
    ) -> Self {
        Self {
            documents,
            blobs,
            search,
        }
    }

    pub async fn execute(&self, document_id: i32) -> Result<(), DeleteDocumentError> {
        let document = self
            .documents
            .find_by_id(document_id)
            .await
            .map_err(|e| DeleteDocumentError::RepositoryError(e.to_string()))?
            .ok_or(DeleteDocumentError::NotFound(document_id))?;

        let deleted = self
            .documents
            .delete(document_id)
            .await
            .map_err(|e| DeleteDocumentError::RepositoryError(e.to_string()))?;
        if !deleted {
            return Err(DeleteDocumentError::NotFound(document_id));
        }

        if let Err(err) = self.blobs.delete(document.blob_key()).await {
            warn!(document_id, error = %err, "Blob cleanup failed");
        }
        if let Some(preview_key) = document.preview_key() {
            if let Err(err) = self.blobs.delete(preview_key).await {
                warn!(document_id, error = %err, "Preview cleanup failed");
            }
        }

        self.search.invalidate_caches().await;

        info!(document_id, "Document deleted");
        Ok(())
    }
}
