pub mod delete_document;
pub mod reprocess_document;
pub mod upload_documents;

pub use delete_document::{DeleteDocumentError, DeleteDocumentUseCase};
pub use reprocess_document::{ReprocessDocumentUseCase, ReprocessError};
pub use upload_documents::{
    UploadDocumentsRequest, UploadDocumentsResponse, UploadDocumentsUseCase, UploadError,
    UploadItem, UploadedDocument,
};
