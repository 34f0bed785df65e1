//! Error types for lmp-onboard
//!
//! Two layers: `ApiError` is what HTTP handlers return (mapped onto status
//! codes and `{error: {code, message}}` bodies); `PipelineError` is the
//! async pipeline's taxonomy, which never reaches a webhook caller
//! directly. It drives retry and review-queue routing instead.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// HTTP-surface error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed payload or missing required fields (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Webhook signature or timestamp rejection (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Source IP outside the allowlist (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Claim token expired (410)
    #[error("Gone: {0}")]
    Gone(String),

    /// Claim attempts locked out (429), with a retry-after hint
    #[error("Too many attempts, retry after {retry_after_secs}s")]
    Locked { retry_after_secs: i64 },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Common library error
    #[error("Common error: {0}")]
    Common(#[from] lmp_common::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, retry_after) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "SECURITY_REJECTION", msg, None)
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "SECURITY_REJECTION", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::Gone(msg) => (StatusCode::GONE, "TOKEN_EXPIRED", msg, None),
            ApiError::Locked { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "CLAIM_LOCKED",
                format!("Too many attempts, retry after {}s", retry_after_secs),
                Some(retry_after_secs),
            ),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None)
            }
            ApiError::Database(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                err.to_string(),
                None,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
                None,
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
                None,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Async pipeline error taxonomy. These are retried per policy and, on
/// exhaustion, diverted to manual review. Never silently dropped.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The content extractor failed or returned garbage
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// A database write inside the pipeline failed
    #[error("Persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Anything else worth retrying
    #[error("{0}")]
    Other(String),
}
