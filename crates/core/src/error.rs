//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid file id: {0}")]
    InvalidFileId(String),

    #[error("invalid storage name: {0}")]
    InvalidStorageName(String),

    #[error("invalid file record: {0}")]
    InvalidRecord(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
