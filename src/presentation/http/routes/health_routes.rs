use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::presentation::http::handlers::HealthHandler;

pub fn health_routes(handler: Arc<HealthHandler>) -> Router {
    Router::new()
        .route("/health", get(HealthHandler::health))
        .route("/health/session", get(HealthHandler::session_health))
        .with_state(handler)
}
