use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::application::services::session_service::{SessionAttributes, SessionService};
use crate::presentation::http::dto::error_response;

pub const SESSION_COOKIE: &str = "session_id";
pub const SESSION_WARNING_HEADER: &str = "x-session-warning";

#[derive(Clone)]
pub struct SessionLayerState {
    pub sessions: Arc<SessionService>,
    pub require_auth: bool,
    pub allow_unauthenticated_on_session_failure: bool,
    pub cookie_secure: bool,
    pub session_ttl_s: u64,
}

/// Resolved per-request session, stashed in request extensions.
#[derive(Clone, Default)]
pub struct SessionContext {
    pub session_id: Option<String>,
    pub attributes: Option<SessionAttributes>,
}

impl SessionContext {
    pub fn authenticated(&self) -> bool {
        self.attributes
            .as_ref()
            .and_then(|attrs| attrs.get("auth"))
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    pub fn actor_id(&self) -> Option<String> {
        self.attributes
            .as_ref()
            .and_then(|attrs| attrs.get("user_id"))
            .and_then(|value| value.as_str())
            .map(|s| s.to_string())
    }
}

/// Resolves the session cookie on the way in and flags degraded session
/// storage on the way out.
pub async fn session_middleware(
    State(state): State<SessionLayerState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session_id = cookie_value(request.headers(), SESSION_COOKIE);

    let mut context = SessionContext {
        session_id: session_id.clone(),
        attributes: None,
    };
    if let Some(id) = &session_id {
        context.attributes = state.sessions.load(id).await;
    }
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;

    if state.sessions.in_fallback_mode() {
        response.headers_mut().insert(
            SESSION_WARNING_HEADER,
            HeaderValue::from_static("session backend degraded; using in-memory fallback"),
        );
    }

    response
}

/// Gate for protected routes. Runs after `session_middleware`.
pub async fn require_auth_middleware(
    State(state): State<SessionLayerState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.require_auth {
        return next.run(request).await;
    }

    let authenticated = request
        .extensions()
        .get::<SessionContext>()
        .map(|ctx| ctx.authenticated())
        .unwrap_or(false);

    if authenticated {
        return next.run(request).await;
    }

    // Sessions that cannot work at all (broken encryption and no backend)
    // surface as 503 rather than a misleading 401, unless the operator
    // explicitly opted into the insecure bypass.
    let health = state.sessions.health().await;
    if !health.encryption_ok {
        if state.allow_unauthenticated_on_session_failure {
            tracing::warn!("Session layer down; admitting request via insecure bypass flag");
            return next.run(request).await;
        }
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "CacheUnavailable",
            "Session layer unavailable",
        );
    }

    error_response(StatusCode::UNAUTHORIZED, "AuthError", "Authentication required")
}

pub fn cookie_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        if key == name {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Session cookie with the contract attributes. `session_id` is the only
/// value that ever crosses the wire.
pub fn session_cookie(session_id: &str, max_age_s: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session_id, max_age_s
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}
