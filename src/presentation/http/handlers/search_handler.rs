use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::Arc;

use crate::application::services::SearchService;
use crate::presentation::http::dto::{
    error_response, internal_error_response, SearchParamsDto, SuggestionParamsDto,
};
use crate::presentation::http::middleware::SessionContext;

pub struct SearchHandler {
    search_service: Arc<SearchService>,
}

impl SearchHandler {
    pub fn new(search_service: Arc<SearchService>) -> Self {
        Self { search_service }
    }

    pub async fn search(
        State(handler): State<Arc<SearchHandler>>,
        Extension(session): Extension<SessionContext>,
        Query(params): Query<SearchParamsDto>,
    ) -> Response {
        let request = match params.into_request(session.actor_id()) {
            Ok(request) => request,
            Err(msg) => {
                return error_response(StatusCode::UNPROCESSABLE_ENTITY, "ValidationError", &msg);
            }
        };

        match handler.search_service.search(&request).await {
            Ok(response) => (StatusCode::OK, Json(response)).into_response(),
            Err(err) => internal_error_response(&err),
        }
    }

    pub async fn suggestions(
        State(handler): State<Arc<SearchHandler>>,
        Query(params): Query<SuggestionParamsDto>,
    ) -> Response {
        let query = params.q.unwrap_or_default();
        match handler.search_service.suggestions(&query, 10).await {
            Ok(suggestions) => (
                StatusCode::OK,
                Json(serde_json::json!({ "suggestions": suggestions })),
            )
                .into_response(),
            Err(err) => internal_error_response(&err),
        }
    }

    pub async fn top_queries(State(handler): State<Arc<SearchHandler>>) -> Response {
        let top = handler.search_service.top_queries(10).await;
        (
            StatusCode::OK,
            Json(serde_json::json!({ "top_queries": top })),
        )
            .into_response()
    }
}
