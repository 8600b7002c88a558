//! Error handling for the pipeline and the API surface
//!
//! The pipeline recovers from source-level failures locally; the store
//! aborts the enclosing transaction on invariant violations; the API maps
//! everything to a single `{"detail": ...}` envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Fetcher-boundary errors. All of these are recovered inside the tier:
/// the failing source contributes an empty batch and the tier continues.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Source timed out after {0} seconds")]
    Timeout(u64),

    #[error("Source not configured (missing API key)")]
    NotConfigured,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(30)
        } else {
            FetchError::SourceUnavailable(err.to_string())
        }
    }
}

/// Event-Store-boundary errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Canonical-URL conflict on insert; treated as a skip by callers.
    #[error("Duplicate canonical URL: {0}")]
    DuplicateUrl(String),

    /// A store invariant would be broken; the enclosing transaction aborts.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

/// Wire envelope for every API error.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// API-boundary errors, mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Request deadline exceeded")]
    Timeout,

    #[error("Internal error")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ApiError::Internal(source) => {
                tracing::error!(error = %source, "Internal error serving request");
            }
            ApiError::Timeout => {
                tracing::warn!("Request deadline exceeded");
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
            }
        }

        let body = ErrorDetail {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
