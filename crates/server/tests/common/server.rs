//! Server test utilities.

use stash_core::config::{AppConfig, MetadataConfig, StorageConfig};
use stash_metadata::{MetadataStore, SqliteStore};
use stash_server::{AppState, create_router};
use stash_storage::{BlobStore, FilesystemBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    storage_path: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and catalog.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(
            modifier,
            |storage| storage as Arc<dyn BlobStore>,
            |metadata| metadata,
        )
        .await
    }

    /// Create a test server whose stores are wrapped, e.g. by fault injectors.
    pub async fn with_stores<S, M>(wrap_storage: S, wrap_metadata: M) -> Self
    where
        S: FnOnce(Arc<FilesystemBackend>) -> Arc<dyn BlobStore>,
        M: FnOnce(Arc<dyn MetadataStore>) -> Arc<dyn MetadataStore>,
    {
        Self::build(|_| {}, wrap_storage, wrap_metadata).await
    }

    async fn build<F, S, M>(modifier: F, wrap_storage: S, wrap_metadata: M) -> Self
    where
        F: FnOnce(&mut AppConfig),
        S: FnOnce(Arc<FilesystemBackend>) -> Arc<dyn BlobStore>,
        M: FnOnce(Arc<dyn MetadataStore>) -> Arc<dyn MetadataStore>,
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("uploads");
        let backend = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let db_path = temp_dir.path().join("catalog.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig {
            storage: StorageConfig::Filesystem {
                path: storage_path.clone(),
            },
            metadata: MetadataConfig::Sqlite {
                path: db_path,
                query_timeout_secs: None,
            },
            ..AppConfig::for_testing()
        };
        modifier(&mut config);
        config.validate().expect("test configuration is invalid");

        stash_server::metrics::register_metrics();
        let state = AppState::new(config, wrap_storage(backend), wrap_metadata(metadata));
        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage_path,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Get access to the underlying blob store.
    pub fn storage(&self) -> Arc<dyn BlobStore> {
        self.state.storage.clone()
    }

    /// Content directory of the filesystem backend.
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Every entry in the content directory, temp files included.
    pub fn storage_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.storage_path)
            .expect("Failed to read storage directory")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
