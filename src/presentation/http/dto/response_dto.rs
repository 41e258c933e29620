use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

/// Error envelope for every non-2xx response. 4xx responses carry the
/// cause; 5xx responses carry only a request id, the cause stays in the
/// server log.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

pub fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    error_response_with_details(status, kind, message, None)
}

pub fn error_response_with_details(
    status: StatusCode,
    kind: &str,
    message: &str,
    details: Option<String>,
) -> Response {
    let body = ApiErrorBody {
        error: ApiErrorDetail {
            kind: kind.to_string(),
            message: message.to_string(),
            details,
            request_id: None,
        },
    };
    (status, Json(body)).into_response()
}

/// 5xx: log the cause server-side, hand the client a correlation id only.
pub fn internal_error_response(cause: &dyn std::fmt::Display) -> Response {
    let request_id = Uuid::new_v4().to_string();
    tracing::error!(request_id = %request_id, error = %cause, "Internal error");

    let body = ApiErrorBody {
        error: ApiErrorDetail {
            kind: "InternalError".to_string(),
            message: "Internal error".to_string(),
            details: None,
            request_id: Some(request_id),
        },
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
