use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::presentation::http::handlers::SearchHandler;

pub fn search_routes(handler: Arc<SearchHandler>) -> Router {
    Router::new()
        .route("/documents/search", get(SearchHandler::search))
        .route("/documents/suggestions", get(SearchHandler::suggestions))
        .route("/search/top-queries", get(SearchHandler::top_queries))
        .with_state(handler)
}
