use std::sync::Arc;

use tracing::{info, warn};

use crate::application::ports::BlobStore;
use crate::domain::repositories::{DocumentRepository, DocumentRepositoryError};
use crate::domain::value_objects::{DocumentStatus, FileKind};
use crate::infrastructure::blob::LocalBlobStore;
use crate::infrastructure::messaging::{EnqueueError, Enqueuer};

#[derive(Debug)]
pub enum UploadError {
    ValidationError(String),
    PayloadTooLarge { size: usize, limit: u64 },
    Backpressure(String),
    StorageError(String),
    RepositoryError(String),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            UploadError::PayloadTooLarge { size, limit } => {
                write!(f, "File of {} bytes exceeds limit of {} bytes", size, limit)
            }
            UploadError::Backpressure(msg) => write!(f, "Backpressure: {}", msg),
            UploadError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            UploadError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<DocumentRepositoryError> for UploadError {
    fn from(error: DocumentRepositoryError) -> Self {
        UploadError::RepositoryError(error.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct UploadItem {
    pub filename: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub id: i32,
    pub filename: String,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone)]
pub struct UploadDocumentsRequest {
    pub files: Vec<UploadItem>,
}

#[derive(Debug, Clone)]
pub struct UploadDocumentsResponse {
    pub documents: Vec<UploadedDocument>,
}

/// Validates uploads, stores their bytes, creates the catalog records and
/// queues processing jobs, staggering successive jobs of one batch.
pub struct UploadDocumentsUseCase {
    documents: Arc<dyn DocumentRepository>,
    blobs: Arc<dyn BlobStore>,
    enqueuer: Arc<Enqueuer>,
    max_file_size_bytes: u64,
}

impl UploadDocumentsUseCase {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        blobs: Arc<dyn BlobStore>,
        enqueuer: Arc<Enqueuer>,
        max_file_size_bytes: u64,
    ) -> Self {
        Self {
            documents,
            blobs,
            enqueuer,
            max_file_size_bytes,
        }
    }

    pub async fn execute(
        &self,
        request: UploadDocumentsRequest,
    ) -> Result<UploadDocumentsResponse, UploadError> {
        if request.files.is_empty() {
            return Err(UploadError::ValidationError(
                "No files provided".to_string(),
            ));
        }

        // Validate the whole batch before touching storage.
        for item in &request.files {
            validate_upload(item, self.max_file_size_bytes)?;
        }

        self.enqueuer
            .check_backpressure()
            .await
            .map_err(|e| match e {
                EnqueueError::Backpressure { .. } => UploadError::Backpressure(e.to_string()),
                other => UploadError::RepositoryError(other.to_string()),
            })?;

        let mut uploaded = Vec::with_capacity(request.files.len());
        for (index, item) in request.files.iter().enumerate() {
            let sanitized = sanitize_filename(&item.filename)?;
            let kind = FileKind::from_filename(&sanitized).ok_or_else(|| {
                UploadError::ValidationError(format!("Unsupported file type: {}", sanitized))
            })?;

            let blob_key = LocalBlobStore::make_key("uploads", &sanitized);
            let content_type = item
                .content_type
                .as_deref()
                .unwrap_or_else(|| kind.content_type());
            self.blobs
                .put(&blob_key, &item.data, content_type)
                .await
                .map_err(|e| UploadError::StorageError(e.to_string()))?;

            let document = self
                .documents
                .create(&sanitized, &blob_key, Some(item.data.len() as i64))
                .await?;

            if let Err(err) = self.enqueuer.enqueue_document(document.id(), index).await {
                // The record exists with status PENDING; the sweeper picks
                // it up if the queue recovers.
                warn!(document_id = document.id(), error = %err, "Enqueue failed after upload");
            }

            info!(
                document_id = document.id(),
                filename = %sanitized,
                size = item.data.len(),
                "Document uploaded"
            );

            uploaded.push(UploadedDocument {
                id: document.id(),
                filename: sanitized,
                status: DocumentStatus::Queued,
            });
        }

        Ok(UploadDocumentsResponse {
            documents: uploaded,
        })
    }
}

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "txt", "docx"];

fn validate_upload(item: &UploadItem, max_size: u64) -> Result<(), UploadError> {
    if item.data.is_empty() {
        return Err(UploadError::ValidationError(format!(
            "File '{}' is empty",
            item.filename
        )));
    }
    if item.data.len() as u64 > max_size {
        return Err(UploadError::PayloadTooLarge {
            size: item.data.len(),
            limit: max_size,
        });
    }

    let sanitized = sanitize_filename(&item.filename)?;
    let extension = sanitized
        .rsplit('.')
        .next()
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadError::ValidationError(format!(
            "Extension '{}' is not allowed",
            extension
        )));
    }

    Ok(())
}

/// Strip directory components and reject hostile names outright.
pub fn sanitize_filename(filename: &str) -> Result<String, UploadError> {
    if filename.trim().is_empty() {
        return Err(UploadError::ValidationError(
            "Filename cannot be empty".to_string(),
        ));
    }
    if filename.contains('\0') {
        return Err(UploadError::ValidationError(
            "Filename contains a null byte".to_string(),
        ));
    }
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(UploadError::ValidationError(
            "Filename contains path components".to_string(),
        ));
    }
    if filename.len() > 255 {
        return Err(UploadError::ValidationError(
            "Filename exceeds 255 characters".to_string(),
        ));
    }

    Ok(filename.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_rejects_traversal_and_null_bytes() {
        assert!(sanitize_filename("../../etc/passwd").is_err());
        assert!(sanitize_filename("..\\windows\\system32").is_err());
        assert!(sanitize_filename("nul\0l.pdf").is_err());
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("   ").is_err());
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn test_validate_upload_extension_whitelist() {
        let ok = UploadItem {
            filename: "scan.jpeg".to_string(),
            data: vec![1, 2, 3],
            content_type: None,
        };
        assert!(validate_upload(&ok, 1024).is_ok());

        let bad = UploadItem {
            filename: "script.sh".to_string(),
            data: vec![1],
            content_type: Some("application/x-sh".to_string()),
        };
        assert!(matches!(
            validate_upload(&bad, 1024),
            Err(UploadError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_upload_size_limit() {
        let item = UploadItem {
            filename: "big.pdf".to_string(),
            data: vec![0; 2048],
            content_type: None,
        };
        assert!(matches!(
            validate_upload(&item, 1024),
            Err(UploadError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_upload_rejects_empty_file() {
        let item = UploadItem {
            filename: "empty.txt".to_string(),
            data: Vec::new(),
            content_type: None,
        };
        assert!(matches!(
            validate_upload(&item, 1024),
            Err(UploadError::ValidationError(_))
        ));
    }
}
