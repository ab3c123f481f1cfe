//! Error types for drafter-da
//!
//! **[DA-ERR-010]** Failure taxonomy: BAD_REQUEST is rejected before any
//! queue submission; SERVICE_UNAVAILABLE covers disabled feature flags and
//! unreachable external converters/bridges; TIMEOUT is surfaced distinctly
//! from other failures so callers can tell "too slow" from "impossible".
//! **[DA-ERR-020]** No failure path may return fabricated data dressed as
//! a successful result.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400) - missing file, unsupported or mismatched
    /// extension, failed signature validation
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// External dependency unavailable (503) - disabled feature flag,
    /// unreachable converter/kernel bridge, retry budget exhausted
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String, #[source] Option<anyhow::Error>),

    /// Queue task exceeded its window (504)
    #[error("Analysis timed out after {0} seconds")]
    Timeout(u64),

    /// Unexpected exception inside a parser/converter (500)
    #[error("File processing error: {0}")]
    FileProcessing(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// drafter-common error
    #[error("Common error: {0}")]
    Common(#[from] drafter_common::Error),
}

impl ApiError {
    /// Service-unavailable with a chained root cause for diagnostics
    pub fn unavailable_with_source(
        msg: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        ApiError::ServiceUnavailable(msg.into(), Some(source.into()))
    }

    /// Service-unavailable without an underlying error (e.g., disabled flag)
    pub fn unavailable(msg: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(msg.into(), None)
    }

    /// Machine-readable error code used in response bodies
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ServiceUnavailable(..) => "SERVICE_UNAVAILABLE",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::FileProcessing(_) => "FILE_PROCESSING_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Io(_) => "IO_ERROR",
            ApiError::Other(_) => "INTERNAL_ERROR",
            ApiError::Common(_) => "COMMON_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::ServiceUnavailable(msg, source) => {
                let message = match source {
                    Some(cause) => format!("{}: {}", msg, cause),
                    None => msg,
                };
                (StatusCode::SERVICE_UNAVAILABLE, message)
            }
            ApiError::Timeout(secs) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("Analysis timed out after {} seconds", secs),
            ),
            ApiError::FileProcessing(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Io(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Other(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Common(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
