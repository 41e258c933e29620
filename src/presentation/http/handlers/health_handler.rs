use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::application::services::session_service::SessionService;

pub struct HealthHandler {
    sessions: Arc<SessionService>,
}

impl HealthHandler {
    pub fn new(sessions: Arc<SessionService>) -> Self {
        Self { sessions }
    }

    pub async fn health() -> Response {
        (StatusCode::OK, Json(serde_json::json!({"ok": true}))).into_response()
    }

    pub async fn session_health(State(handler): State<Arc<HealthHandler>>) -> Response {
        let health = handler.sessions.health().await;
        let status = if health.backend_up && health.encryption_ok {
            "ok"
        } else {
            "error"
        };

        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": status,
                "backend_up": health.backend_up,
                "encryption_ok": health.encryption_ok,
                "fallback": health.fallback,
            })),
        )
            .into_response()
    }
}
