//! Application state shared across handlers.

use crate::ingest::Coordinator;
use stash_core::config::AppConfig;
use stash_metadata::MetadataStore;
use stash_storage::BlobStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Blob storage backend.
    pub storage: Arc<dyn BlobStore>,
    /// Metadata catalog.
    pub metadata: Arc<dyn MetadataStore>,
    /// Upload and deletion workflows.
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The coordinator is built from the configured upload policy and
    /// public prefix.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let coordinator = Coordinator::new(
            config.upload.clone(),
            config.server.public_prefix.clone(),
            storage.clone(),
            metadata.clone(),
        );
        Self {
            config: Arc::new(config),
            storage,
            metadata,
            coordinator: Arc::new(coordinator),
        }
    }

    /// Request body ceiling: the upload limit plus room for multipart framing.
    pub fn body_limit(&self) -> usize {
        let limit = self
            .config
            .upload
            .max_size_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

/// Allowance for multipart boundaries, part headers and small text fields.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;
