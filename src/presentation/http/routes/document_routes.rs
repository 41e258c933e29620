use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

use crate::presentation::http::handlers::DocumentHandler;

pub fn document_routes(handler: Arc<DocumentHandler>) -> Router {
    Router::new()
        .route("/documents/upload", post(DocumentHandler::upload))
        .route("/documents/{id}", get(DocumentHandler::get_document))
        .route("/documents/{id}", delete(DocumentHandler::delete))
        .route("/documents/{id}/download", get(DocumentHandler::download))
        .route("/documents/{id}/preview", get(DocumentHandler::preview))
        .route("/documents/{id}/status", get(DocumentHandler::status))
        .route("/documents/{id}/reprocess", post(DocumentHandler::reprocess))
        .with_state(handler)
}
