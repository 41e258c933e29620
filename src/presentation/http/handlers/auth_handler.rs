use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::application::services::session_service::{SessionAttributes, SessionService};
use crate::presentation::http::dto::{error_response, internal_error_response};
use crate::presentation::http::middleware::{
    expired_session_cookie, session_cookie, LoginRateLimiter, SessionContext,
};

pub struct AuthHandler {
    sessions: Arc<SessionService>,
    rate_limiter: Arc<LoginRateLimiter>,
    app_password: String,
    cookie_secure: bool,
    session_ttl_s: u64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

impl AuthHandler {
    pub fn new(
        sessions: Arc<SessionService>,
        rate_limiter: Arc<LoginRateLimiter>,
        app_password: String,
        cookie_secure: bool,
        session_ttl_s: u64,
    ) -> Self {
        Self {
            sessions,
            rate_limiter,
            app_password,
            cookie_secure,
            session_ttl_s,
        }
    }

    pub async fn login(
        State(handler): State<Arc<AuthHandler>>,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        Json(request): Json<LoginRequest>,
    ) -> Response {
        if !handler.rate_limiter.allow(addr.ip()) {
            return error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimited",
                "Too many login attempts; try again later",
            );
        }

        if !password_matches(&request.password, &handler.app_password) {
            return error_response(StatusCode::UNAUTHORIZED, "AuthError", "Invalid password");
        }

        let mut attributes = SessionAttributes::new();
        attributes.insert("auth".to_string(), serde_json::json!(true));

        match handler.sessions.create(attributes).await {
            Ok(session_id) => {
                let cookie =
                    session_cookie(&session_id, handler.session_ttl_s, handler.cookie_secure);
                (
                    StatusCode::OK,
                    [(header::SET_COOKIE, cookie)],
                    Json(serde_json::json!({"success": true})),
                )
                    .into_response()
            }
            Err(err) => internal_error_response(&err),
        }
    }

    pub async fn logout(
        State(handler): State<Arc<AuthHandler>>,
        Extension(session): Extension<SessionContext>,
    ) -> Response {
        if let Some(session_id) = &session.session_id {
            handler.sessions.destroy(session_id).await;
        }

        (
            StatusCode::OK,
            [(
                header::SET_COOKIE,
                expired_session_cookie(handler.cookie_secure),
            )],
            Json(serde_json::json!({"success": true})),
        )
            .into_response()
    }
}

/// Constant-time comparison over fixed-size digests; the plaintext
/// lengths never influence timing.
fn password_matches(candidate: &str, expected: &str) -> bool {
    let candidate_digest = Sha256::digest(candidate.as_bytes());
    let expected_digest = Sha256::digest(expected.as_bytes());

    candidate_digest
        .iter()
        .zip(expected_digest.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_comparison() {
        assert!(password_matches("hunter2", "hunter2"));
        assert!(!password_matches("hunter2", "hunter3"));
        assert!(!password_matches("", "hunter2"));
        assert!(!password_matches("hunter2hunter2", "hunter2"));
    }
}
