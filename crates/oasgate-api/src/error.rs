//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Validation failures keep their status and carry the engine's error list
//! in `details`; failures of the middleware itself (unreadable bodies, a
//! handler asking for a request that was never validated) get their own
//! variants.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use oasgate_core::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "UNKNOWN_QUERY_PARAMETER").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// The `{path, message, errorCode}` list of a validation failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Marker extension on responses produced by a rejected request, so the
/// response layer does not check them against the document.
#[derive(Debug, Clone, Copy)]
pub struct Rejection;

/// Error type of the validation middleware.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request or response broke the document.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Request body could not be read or parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(err) => (
                StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                err.code(),
            ),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "validation middleware returned a server error");
        }

        let (message, details) = match &self {
            Self::Validation(err) => (err.message.clone(), serde_json::to_value(&err.errors).ok()),
            Self::Internal(_) => ("An internal error occurred".to_string(), None),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(Rejection);
        response
    }
}
