//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same JSON error shape and maps engine
//! errors onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use frontdesk_core::error::FrontdeskError;
use frontdesk_routing::{EscalationError, ReceptionistError, RetrievalError, ThreadError};

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 404 Not Found - unknown thread or resource.
    NotFound(String),
    /// 500 Internal Server Error - storage or unexpected failure.
    Internal(String),
    /// 503 Service Unavailable - search upstream down or timed out.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), %message, "Request failed");
        }

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<FrontdeskError> for ApiError {
    fn from(err: FrontdeskError) -> Self {
        match err {
            FrontdeskError::Validation(msg) => ApiError::BadRequest(msg),
            FrontdeskError::Search(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ThreadError> for ApiError {
    fn from(err: ThreadError) -> Self {
        match err {
            ThreadError::Validation(msg) => ApiError::BadRequest(msg),
            ThreadError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ThreadError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidQuery(msg) => ApiError::BadRequest(msg),
            other => ApiError::ServiceUnavailable(other.to_string()),
        }
    }
}

impl From<EscalationError> for ApiError {
    fn from(err: EscalationError) -> Self {
        match err {
            EscalationError::Validation(msg) => ApiError::BadRequest(msg),
            EscalationError::Storage(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl From<ReceptionistError> for ApiError {
    fn from(err: ReceptionistError) -> Self {
        match err {
            ReceptionistError::Thread(e) => e.into(),
            ReceptionistError::Escalation(e) => e.into(),
        }
    }
}
