//! HTTP request handlers for the relay API.
//!
//! Error responses share one shape:
//!
//! ```json
//! { "error": { "code": "E1002", "message": "[E1002] Empty payload: ..." } }
//! ```
//!
//! with the status taken from the error's taxonomy entry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use leadrelay_core::RelayError;
use serde::Serialize;

pub mod email;
pub mod health;
pub mod metrics;
pub mod queue;
pub mod schema;
pub mod webhook;

pub use email::email_webhook;
pub use health::health_check;
pub use metrics::{get_metrics, reset_metrics};
pub use queue::{clear_queue, process_queue};
pub use schema::get_schema;
pub use webhook::{source_webhook, webhook};

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error code and description.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable code from the relay error taxonomy
    pub code: String,
    /// Human-readable description
    pub message: String,
}

/// Renders a relay error with its own status code.
pub(crate) fn error_response(error: &RelayError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    create_error_response(status, error.code(), error.to_string())
}

pub(crate) fn create_error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail { code: code.to_string(), message: message.into() },
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_uses_taxonomy_status() {
        let response = error_response(&RelayError::PayloadTooLarge {
            size_bytes: 2_000_000,
            limit_bytes: 1_048_576,
        });
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = error_response(&RelayError::InvalidSignature { reason: "x".into() });
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
