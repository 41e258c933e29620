use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::application::ports::BlobStore;
use crate::application::use_cases::{
    DeleteDocumentError, DeleteDocumentUseCase, ReprocessDocumentUseCase, ReprocessError,
    UploadDocumentsRequest, UploadDocumentsUseCase, UploadError, UploadItem,
};
use crate::domain::repositories::DocumentRepository;
use crate::presentation::http::dto::{
    error_response, internal_error_response, DocumentDetailDto, DocumentStatusDto,
    ReprocessResponseDto, UploadResponseDto, UploadedDocumentDto,
};

/// Presigned download URLs are valid this long; they are minted per
/// request and never persisted.
const DOWNLOAD_URL_TTL_S: u64 = 600;

/// 1x1 transparent PNG served when a document has no rendered preview.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub struct DocumentHandler {
    upload_use_case: Arc<UploadDocumentsUseCase>,
    reprocess_use_case: Arc<ReprocessDocumentUseCase>,
    delete_use_case: Arc<DeleteDocumentUseCase>,
    documents: Arc<dyn DocumentRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl DocumentHandler {
    pub fn new(
        upload_use_case: Arc<UploadDocumentsUseCase>,
        reprocess_use_case: Arc<ReprocessDocumentUseCase>,
        delete_use_case: Arc<DeleteDocumentUseCase>,
        documents: Arc<dyn DocumentRepository>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            upload_use_case,
            reprocess_use_case,
            delete_use_case,
            documents,
            blobs,
        }
    }

    pub async fn upload(
        State(handler): State<Arc<DocumentHandler>>,
        mut multipart: Multipart,
    ) -> Response {
        let mut files = Vec::new();

        loop {
            match multipart.next_field().await {
                Ok(Some(field)) => {
                    let Some(filename) = field.file_name().map(|n| n.to_string()) else {
                        continue;
                    };
                    let content_type = field.content_type().map(|ct| ct.to_string());
                    match field.bytes().await {
                        Ok(data) => files.push(UploadItem {
                            filename,
                            data: data.to_vec(),
                            content_type,
                        }),
                        Err(err) => {
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                "ValidationError",
                                &format!("Failed to read upload: {}", err),
                            );
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        "ValidationError",
                        &format!("Malformed multipart body: {}", err),
                    );
                }
            }
        }

        match handler
            .upload_use_case
            .execute(UploadDocumentsRequest { files })
            .await
        {
            Ok(response) => {
                let dto = UploadResponseDto {
                    documents: response
                        .documents
                        .into_iter()
                        .map(|d| UploadedDocumentDto {
                            id: d.id,
                            filename: d.filename,
                            status: d.status.to_string(),
                        })
                        .collect(),
                };
                (StatusCode::CREATED, Json(dto)).into_response()
            }
            Err(UploadError::ValidationError(msg)) => {
                error_response(StatusCode::BAD_REQUEST, "ValidationError", &msg)
            }
            Err(err @ UploadError::PayloadTooLarge { .. }) => {
                error_response(StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge", &err.to_string())
            }
            Err(UploadError::Backpressure(msg)) => {
                let mut response =
                    error_response(StatusCode::SERVICE_UNAVAILABLE, "Backpressure", &msg);
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    header::HeaderValue::from_static("30"),
                );
                response
            }
            Err(err) => internal_error_response(&err),
        }
    }

    pub async fn get_document(
        State(handler): State<Arc<DocumentHandler>>,
        Path(id): Path<i32>,
    ) -> Response {
        match handler.documents.find_by_id(id).await {
            Ok(Some(document)) => {
                (StatusCode::OK, Json(DocumentDetailDto::from(&document))).into_response()
            }
            Ok(None) => document_not_found(id),
            Err(err) => internal_error_response(&err),
        }
    }

    pub async fn status(
        State(handler): State<Arc<DocumentHandler>>,
        Path(id): Path<i32>,
    ) -> Response {
        match handler.documents.find_by_id(id).await {
            Ok(Some(document)) => {
                (StatusCode::OK, Json(DocumentStatusDto::from(&document))).into_response()
            }
            Ok(None) => document_not_found(id),
            Err(err) => internal_error_response(&err),
        }
    }

    pub async fn download(
        State(handler): State<Arc<DocumentHandler>>,
        Path(id): Path<i32>,
    ) -> Response {
        let document = match handler.documents.find_by_id(id).await {
            Ok(Some(document)) => document,
            Ok(None) => return document_not_found(id),
            Err(err) => return internal_error_response(&err),
        };

        // Prefer a presigned redirect when the backend can mint one.
        match handler
            .blobs
            .presigned_get(document.blob_key(), DOWNLOAD_URL_TTL_S)
            .await
        {
            Ok(Some(url)) => {
                return match header::HeaderValue::from_str(&url) {
                    Ok(location) => {
                        (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
                    }
                    Err(err) => internal_error_response(&err),
                };
            }
            Ok(None) => {}
            Err(err) => return internal_error_response(&err),
        }

        match handler.blobs.get(document.blob_key()).await {
            Ok(data) => {
                let content_type = crate::domain::value_objects::FileKind::from_filename(
                    document.filename(),
                )
                .map(|k| k.content_type())
                .unwrap_or("application/octet-stream");
                (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, content_type.to_string()),
                        (
                            header::CONTENT_DISPOSITION,
                            format!("attachment; filename=\"{}\"", document.filename()),
                        ),
                    ],
                    data,
                )
                    .into_response()
            }
            Err(err) => error_response(
                StatusCode::NOT_FOUND,
                "BlobMissing",
                &format!("Stored bytes unavailable: {}", err),
            ),
        }
    }

    pub async fn preview(
        State(handler): State<Arc<DocumentHandler>>,
        Path(id): Path<i32>,
    ) -> Response {
        let document = match handler.documents.find_by_id(id).await {
            Ok(Some(document)) => document,
            Ok(None) => return document_not_found(id),
            Err(err) => return internal_error_response(&err),
        };

        if let Some(preview_key) = document.preview_key() {
            if let Ok(data) = handler.blobs.get(preview_key).await {
                return (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "image/png")],
                    data,
                )
                    .into_response();
            }
        }

        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png")],
            PLACEHOLDER_PNG.to_vec(),
        )
            .into_response()
    }

    pub async fn reprocess(
        State(handler): State<Arc<DocumentHandler>>,
        Path(id): Path<i32>,
    ) -> Response {
        match handler.reprocess_use_case.execute(id).await {
            Ok(response) => (
                StatusCode::OK,
                Json(ReprocessResponseDto {
                    success: response.success,
                    document_id: response.document_id,
                }),
            )
                .into_response(),
            Err(ReprocessError::NotFound(id)) => document_not_found(id),
            Err(ReprocessError::ConflictingState(msg)) => {
                error_response(StatusCode::CONFLICT, "ConflictingState", &msg)
            }
            Err(err) => internal_error_response(&err),
        }
    }

    pub async fn delete(
        State(handler): State<Arc<DocumentHandler>>,
        Path(id): Path<i32>,
    ) -> Response {
        match handler.delete_use_case.execute(id).await {
            Ok(()) => (
                StatusCode::OK,
                Json(serde_json::json!({"success": true, "document_id": id})),
            )
                .into_response(),
            Err(DeleteDocumentError::NotFound(id)) => document_not_found(id),
            Err(err) => internal_error_response(&err),
        }
    }
}

fn document_not_found(id: i32) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "NotFound",
        &format!("Document {} not found", id),
    )
}
