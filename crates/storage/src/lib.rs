//! Blob storage for uploaded file contents.
//!
//! This crate provides:
//! - The [`BlobStore`] abstraction with atomic streaming writes
//! - Idempotent deletion and orphan-sweep listing
//! - A local filesystem backend

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{BlobEntry, BlobMeta, BlobStore, ByteStream, StreamingUpload, write_stream};

use stash_core::config::StorageConfig;
use std::sync::Arc;

/// Create a blob store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            tracing::info!(path = %path.display(), "Using filesystem blob storage");
            Ok(Arc::new(backend))
        }
    }
}
