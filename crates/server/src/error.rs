//! API error types.

use crate::ingest::IngestError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use stash_core::Rejection;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("please upload a file")]
    MissingFile,

    #[error("file type not allowed: {0}")]
    UnsupportedType(String),

    #[error("file exceeds the maximum size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("file not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] stash_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] stash_metadata::MetadataError),

    #[error("core error: {0}")]
    Core(#[from] stash_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFile => "missing_file",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::TooLarge { .. } => "too_large",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound => "not_found",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
            Self::Metadata(_) => "metadata_error",
            Self::Core(_) => "core_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::Storage(_) | Self::Metadata(_) | Self::Core(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message returned to the client. Server-side failures never leak detail.
    pub fn message(&self) -> String {
        if self.status_code().is_server_error() {
            "server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::UnsupportedType { mime_type } => Self::UnsupportedType(mime_type),
            Rejection::TooLarge { limit } => Self::TooLarge { limit },
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingFile => Self::MissingFile,
            IngestError::Rejected(rejection) => rejection.into(),
            IngestError::Client(message) => Self::BadRequest(message),
            IngestError::NotFound => Self::NotFound,
            IngestError::Storage(e) => Self::Storage(e),
            IngestError::Catalog(e) => Self::Metadata(e),
            // Records are built from client-declared fields.
            IngestError::Record(e) => Self::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
