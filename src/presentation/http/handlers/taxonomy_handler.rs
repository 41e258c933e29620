use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::application::services::TaxonomyService;

pub struct TaxonomyHandler {
    taxonomy: Arc<TaxonomyService>,
}

#[derive(Debug, Deserialize)]
pub struct TermSearchParams {
    pub q: Option<String>,
}

impl TaxonomyHandler {
    pub fn new(taxonomy: Arc<TaxonomyService>) -> Self {
        Self { taxonomy }
    }

    pub async fn hierarchy(State(handler): State<Arc<TaxonomyHandler>>) -> Response {
        (StatusCode::OK, Json(handler.taxonomy.hierarchy())).into_response()
    }

    pub async fn categories(State(handler): State<Arc<TaxonomyHandler>>) -> Response {
        let statistics = handler.taxonomy.statistics();
        let categories: Vec<serde_json::Value> = statistics
            .category_breakdown
            .iter()
            .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
            .collect();
        (
            StatusCode::OK,
            Json(serde_json::json!({ "categories": categories })),
        )
            .into_response()
    }

    pub async fn canonical_terms(State(handler): State<Arc<TaxonomyHandler>>) -> Response {
        let mut terms: Vec<String> = handler.taxonomy.canonical_terms().into_iter().collect();
        terms.sort();
        (
            StatusCode::OK,
            Json(serde_json::json!({ "canonical_terms": terms })),
        )
            .into_response()
    }

    pub async fn search(
        State(handler): State<Arc<TaxonomyHandler>>,
        Query(params): Query<TermSearchParams>,
    ) -> Response {
        let query = params.q.unwrap_or_default();
        let terms = handler.taxonomy.search(&query, 20);
        (StatusCode::OK, Json(serde_json::json!({ "terms": terms }))).into_response()
    }

    pub async fn statistics(State(handler): State<Arc<TaxonomyHandler>>) -> Response {
        (StatusCode::OK, Json(handler.taxonomy.statistics())).into_response()
    }
}
