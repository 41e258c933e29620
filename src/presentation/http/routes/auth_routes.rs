use axum::routing::post;
use axum::Router;
use std::sync::Arc;

use crate::presentation::http::handlers::AuthHandler;

pub fn auth_routes(handler: Arc<AuthHandler>) -> Router {
    Router::new()
        .route("/login", post(AuthHandler::login))
        .route("/logout", post(AuthHandler::logout))
        .with_state(handler)
}
