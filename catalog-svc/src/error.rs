//! Error types for catalog-svc
//!
//! [`CatalogError`] is the domain failure returned by the command handlers,
//! the parser and the upload orchestrator. [`ApiError`] maps it onto HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::validator::FieldErrors;

/// Domain error kinds
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Field-level validation failure; never retried
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Unknown (or soft-deleted) id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// File format tag is neither csv nor json
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// CSV row whose cell count differs from the header
    #[error("Row shape mismatch on line {line}: expected {expected} fields, found {found}")]
    RowShapeMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Upload with no bytes
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// Payload or message body that cannot be decoded
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// Storage or configuration failure
    #[error(transparent)]
    Common(#[from] catalog_common::Error),
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::Common(catalog_common::Error::Database(err))
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Malformed(err.to_string())
    }
}

/// Result type for domain operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Validation failure with per-field messages (400)
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(fields) => ApiError::Validation(fields),
            CatalogError::NotFound(msg) => ApiError::NotFound(msg),
            CatalogError::InvalidOperation(_)
            | CatalogError::UnsupportedFormat(_)
            | CatalogError::RowShapeMismatch { .. }
            | CatalogError::EmptyFile
            | CatalogError::Malformed(_) => ApiError::BadRequest(err.to_string()),
            CatalogError::Common(catalog_common::Error::NotFound(msg)) => ApiError::NotFound(msg),
            CatalogError::Common(catalog_common::Error::InvalidInput(msg)) => {
                ApiError::BadRequest(msg)
            }
            CatalogError::Common(other) => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, fields) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "One or more fields are invalid".to_string(),
                Some(fields),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error while handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None)
            }
        };

        let body = match fields {
            Some(fields) => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                    "fields": fields,
                }
            }),
            None => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
