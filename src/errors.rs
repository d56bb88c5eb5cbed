use crate::services::storage_service::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Failures of the credential issuance core.
///
/// Each variant carries a different retry policy: `InvalidInput` is the
/// caller's fault, `StorageUnavailable` may be retried with backoff, and
/// `SigningFailure` points at broken key material and is never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("signing failure: {0}")]
    SigningFailure(String),
}

impl CredentialError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CredentialError::StorageUnavailable(_))
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidInput(msg) => AppError::new(StatusCode::BAD_REQUEST, msg),
            CredentialError::StorageUnavailable(msg) => {
                tracing::warn!("storage unavailable: {}", msg);
                AppError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage is temporarily unavailable, retry later",
                )
            }
            CredentialError::SigningFailure(msg) => {
                tracing::error!("credential signing failed: {}", msg);
                AppError::internal("failed to issue access credential")
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ContainerNotFound(_) | StorageError::ObjectNotFound { .. } => {
                AppError::not_found(err.to_string())
            }
            StorageError::InvalidName(_) => AppError::new(StatusCode::BAD_REQUEST, err.to_string()),
            StorageError::AccessDenied(reason) => {
                tracing::debug!("blob access denied: {}", reason);
                AppError::new(StatusCode::FORBIDDEN, "access denied")
            }
            StorageError::Sqlx(_) | StorageError::Io(_) => {
                tracing::error!("blob store failure: {}", err);
                AppError::internal("storage failure")
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("database error: {}", err);
        AppError::internal("database error")
    }
}
