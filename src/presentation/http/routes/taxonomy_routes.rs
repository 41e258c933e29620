use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::presentation::http::handlers::TaxonomyHandler;

pub fn taxonomy_routes(handler: Arc<TaxonomyHandler>) -> Router {
    Router::new()
        .route("/taxonomy/hierarchy", get(TaxonomyHandler::hierarchy))
        .route("/taxonomy/categories", get(TaxonomyHandler::categories))
        .route(
            "/taxonomy/canonical-terms",
            get(TaxonomyHandler::canonical_terms),
        )
        .route("/taxonomy/search", get(TaxonomyHandler::search))
        .route("/taxonomy/statistics", get(TaxonomyHandler::statistics))
        .with_state(handler)
}
