// crates/server/src/error.rs
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use gitscout_core::llm::LlmError;
use gitscout_core::store::StoreError;
use gitscout_github::GitHubError;

use crate::auth::AuthError;
use crate::crypto::CryptoError;
use crate::deep_dive::DeepDiveError;
use crate::jobs::JobError;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] GitHubError),

    #[error("persistence error: {0}")]
    Store(#[from] StoreError),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyRunning(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DeepDiveError> for ApiError {
    fn from(err: DeepDiveError) -> Self {
        match err {
            DeepDiveError::NotConfigured => {
                ApiError::NotConfigured("deep dive feature is not available".into())
            }
            DeepDiveError::IssueNotFound => ApiError::NotFound("issue not found".into()),
            DeepDiveError::Llm(LlmError::NotConfigured) => {
                ApiError::NotConfigured("deep dive feature is not available".into())
            }
            DeepDiveError::Llm(inner) => ApiError::Internal(inner.to_string()),
            DeepDiveError::Store(inner) => ApiError::Store(inner),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidRefreshToken => {
                ApiError::Unauthorized("invalid refresh token".into())
            }
            AuthError::Upstream(inner) => ApiError::Upstream(inner),
            AuthError::Store(inner) => ApiError::Store(inner),
            AuthError::Crypto(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::NotFound(msg) => {
                tracing::debug!(message = %msg, "not found");
                (StatusCode::NOT_FOUND, ErrorResponse::new(msg.clone()))
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "bad request");
                (StatusCode::BAD_REQUEST, ErrorResponse::new(msg.clone()))
            }
            ApiError::Unauthorized(msg) => {
                tracing::debug!(message = %msg, "unauthorized");
                (StatusCode::UNAUTHORIZED, ErrorResponse::new(msg.clone()))
            }
            ApiError::Forbidden(msg) => {
                tracing::warn!(message = %msg, "forbidden");
                (StatusCode::FORBIDDEN, ErrorResponse::new(msg.clone()))
            }
            ApiError::Conflict(msg) => {
                tracing::warn!(message = %msg, "conflict");
                (StatusCode::CONFLICT, ErrorResponse::new(msg.clone()))
            }
            ApiError::NotConfigured(msg) => {
                tracing::warn!(message = %msg, "feature not configured");
                (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse::new(msg.clone()))
            }
            ApiError::Upstream(err) => {
                tracing::warn!(error = %err, "upstream failure");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::with_details("upstream service error", err.to_string()),
                )
            }
            ApiError::Store(err) => {
                tracing::error!(error = %err, "persistence failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal server error"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "internal server error");
                // Internal details never reach clients.
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
