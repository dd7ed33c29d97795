//! Error types for the webhook ingestion and DLQ admin surface.
//!
//! Every precondition failure maps to a distinct machine-readable error code
//! and HTTP status; duplicates are never errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Webhook pipeline error variants.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Timestamp outside freshness window")]
    StaleTimestamp,

    #[error("Signature verification failed")]
    BadSignature,

    #[error("Request body is not valid JSON with id and type")]
    BadJson,

    #[error("Two-eyes approval required")]
    TwoEyesRequired,

    #[error("Missing or malformed idempotency key")]
    InvalidIdempotencyKey,

    #[error("DLQ entry not found")]
    NotFound,

    #[error("Downstream delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Event processing failed: {0}")]
    Processing(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON error response returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}

impl WebhookError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::StaleTimestamp => "stale_timestamp",
            WebhookError::BadSignature => "bad_signature",
            WebhookError::BadJson => "bad_json",
            WebhookError::TwoEyesRequired => "two_eyes_required",
            WebhookError::InvalidIdempotencyKey => "invalid_idempotency_key",
            WebhookError::NotFound => "not_found",
            WebhookError::DeliveryFailed(_) => "delivery_failed",
            WebhookError::Processing(_) => "processing_error",
            WebhookError::Internal(_) => "server_error",
        }
    }

    /// HTTP status for the variant.
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::StaleTimestamp
            | WebhookError::BadSignature
            | WebhookError::TwoEyesRequired => StatusCode::UNAUTHORIZED,
            WebhookError::BadJson | WebhookError::InvalidIdempotencyKey => StatusCode::BAD_REQUEST,
            WebhookError::NotFound => StatusCode::NOT_FOUND,
            WebhookError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            WebhookError::Processing(_) | WebhookError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, WebhookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_are_401() {
        assert_eq!(WebhookError::StaleTimestamp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(WebhookError::BadSignature.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(WebhookError::TwoEyesRequired.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(WebhookError::StaleTimestamp.code(), "stale_timestamp");
        assert_eq!(WebhookError::BadSignature.code(), "bad_signature");
        assert_eq!(WebhookError::BadJson.code(), "bad_json");
        assert_eq!(WebhookError::TwoEyesRequired.code(), "two_eyes_required");
        assert_eq!(
            WebhookError::InvalidIdempotencyKey.code(),
            "invalid_idempotency_key"
        );
        assert_eq!(WebhookError::NotFound.code(), "not_found");
        assert_eq!(
            WebhookError::DeliveryFailed("x".into()).code(),
            "delivery_failed"
        );
        assert_eq!(WebhookError::Processing("x".into()).code(), "processing_error");
        assert_eq!(WebhookError::Internal("x".into()).code(), "server_error");
    }
}
