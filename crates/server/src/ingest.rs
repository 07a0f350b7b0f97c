//! Upload ingestion and deletion workflows.
//!
//! An upload moves through `Received -> Validated -> Stored -> Cataloged ->
//! Complete`. Nothing reaches the catalog unless its blob is durable, and a
//! blob whose catalog insert fails (or whose request is dropped before the
//! insert finishes) is removed again.

use bytes::Bytes;
use futures::Stream;
use stash_core::{FileId, FileRecord, Gate, NewFileRecord, Rejection, StorageName, UploadPolicy};
use stash_metadata::{FileRepo, MetadataError, MetadataStore};
use stash_storage::{BlobStore, StorageError, write_stream};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics;

/// Errors from the ingestion coordinator.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no file part in upload")]
    MissingFile,

    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// The client sent a body that could not be read.
    #[error("malformed upload body: {0}")]
    Client(String),

    #[error("file not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("catalog failure: {0}")]
    Catalog(#[from] MetadataError),

    #[error("invalid file record: {0}")]
    Record(#[from] stash_core::Error),
}

/// Coordinates the gate, blob store and catalog for uploads and deletions.
pub struct Coordinator {
    gate: Gate,
    public_prefix: String,
    storage: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl Coordinator {
    pub fn new(
        policy: UploadPolicy,
        public_prefix: impl Into<String>,
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            gate: Gate::new(policy),
            public_prefix: public_prefix.into(),
            storage,
            metadata,
        }
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Store an uploaded file and catalog it.
    ///
    /// `body` is consumed lazily; a rejected type reads none of it and an
    /// oversized body is abandoned as soon as it crosses the limit.
    pub async fn ingest<S>(
        &self,
        original_name: &str,
        mime_type: &str,
        body: S,
    ) -> Result<FileRecord, IngestError>
    where
        S: Stream<Item = Result<Bytes, IngestError>> + Send,
    {
        let started = Instant::now();
        if original_name.trim().is_empty() {
            return Err(IngestError::MissingFile);
        }
        let name = StorageName::generate(original_name);
        tracing::debug!(storage_name = %name, original_name, mime_type, "Upload received");

        if let Err(rejection) = self.gate.admit(mime_type) {
            metrics::record_rejection(&rejection);
            tracing::debug!(storage_name = %name, reason = %rejection, "Upload rejected");
            return Err(rejection.into());
        }
        tracing::debug!(storage_name = %name, "Upload validated");

        // Armed across the write: a drop during the final rename must still
        // remove the blob.
        let pending = PendingBlob::new(self.storage.clone(), name.clone());
        let bounded = self.gate.bound(body);
        let size_bytes = match write_stream(self.storage.as_ref(), &name, bounded).await {
            Ok(size) => size,
            Err(e) => {
                // A failed write never leaves a blob under the final name.
                pending.disarm();
                return Err(self.write_failed(&name, e));
            }
        };
        tracing::debug!(storage_name = %name, size_bytes, "Upload stored");

        let record = match NewFileRecord::new(
            name.clone(),
            original_name,
            mime_type,
            size_bytes,
            &self.public_prefix,
        ) {
            Ok(record) => record,
            Err(e) => {
                pending.compensate().await;
                return Err(e.into());
            }
        };

        let record = match self.metadata.insert_file(&record).await {
            Ok(record) => record,
            Err(e) => {
                metrics::UPLOAD_FAILURES.with_label_values(&["catalog"]).inc();
                tracing::error!(storage_name = %name, error = %e, "Failed to catalog upload");
                pending.compensate().await;
                return Err(e.into());
            }
        };
        pending.disarm();
        tracing::debug!(storage_name = %name, file_id = %record.id, "Upload cataloged");

        metrics::UPLOADS_ACCEPTED.inc();
        metrics::BYTES_INGESTED.inc_by(size_bytes);
        metrics::UPLOAD_DURATION.observe(started.elapsed().as_secs_f64());
        tracing::info!(
            file_id = %record.id,
            storage_name = %name,
            size_bytes,
            "Upload complete"
        );
        Ok(record)
    }

    fn write_failed(&self, name: &StorageName, err: IngestError) -> IngestError {
        match err {
            IngestError::Rejected(rejection) => {
                metrics::record_rejection(&rejection);
                tracing::debug!(storage_name = %name, reason = %rejection, "Upload rejected mid-stream");
                rejection.into()
            }
            e @ IngestError::Client(_) => {
                tracing::debug!(storage_name = %name, error = %e, "Upload body aborted by client");
                e
            }
            e => {
                metrics::UPLOAD_FAILURES.with_label_values(&["storage"]).inc();
                tracing::error!(storage_name = %name, error = %e, "Failed to store upload");
                e
            }
        }
    }

    /// All cataloged files, newest first.
    pub async fn list(&self) -> Result<Vec<FileRecord>, IngestError> {
        Ok(self.metadata.list_files().await?)
    }

    /// Look up a cataloged file by the name its blob is stored under.
    pub async fn find_by_storage_name(
        &self,
        name: &StorageName,
    ) -> Result<Option<FileRecord>, IngestError> {
        Ok(self.metadata.get_file_by_storage_name(name).await?)
    }

    /// Delete a file: catalog row first, then the blob on a best-effort basis.
    pub async fn remove(&self, id: FileId) -> Result<FileRecord, IngestError> {
        let record = self
            .metadata
            .get_file(id)
            .await?
            .ok_or(IngestError::NotFound)?;

        match self.metadata.delete_file(id).await {
            Ok(()) => {}
            // Lost a race with a concurrent delete.
            Err(MetadataError::NotFound(_)) => return Err(IngestError::NotFound),
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.storage.delete(&record.storage_name).await {
            metrics::record_cleanup_failure(metrics::CLEANUP_BLOB_DELETE);
            tracing::warn!(
                file_id = %id,
                storage_name = %record.storage_name,
                error = %e,
                "Failed to delete blob of removed file"
            );
        }

        metrics::FILES_DELETED.inc();
        tracing::info!(file_id = %id, storage_name = %record.storage_name, "File deleted");
        Ok(record)
    }
}

/// A stored blob that has no catalog row yet.
///
/// Dropped while armed (the request future was cancelled between store and
/// catalog), it schedules deletion of the blob on the runtime.
struct PendingBlob {
    storage: Arc<dyn BlobStore>,
    name: StorageName,
    armed: bool,
}

impl PendingBlob {
    fn new(storage: Arc<dyn BlobStore>, name: StorageName) -> Self {
        Self {
            storage,
            name,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }

    /// Delete the blob now. Stays armed until the delete has run, so a
    /// cancelled compensation is retried from `drop`.
    async fn compensate(mut self) {
        remove_orphan(self.storage.as_ref(), &self.name).await;
        self.armed = false;
    }
}

impl Drop for PendingBlob {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let storage = self.storage.clone();
        let name = self.name.clone();
        tracing::warn!(storage_name = %name, "Upload dropped before it was cataloged; removing blob");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    remove_orphan(storage.as_ref(), &name).await;
                });
            }
            Err(_) => {
                metrics::record_cleanup_failure(metrics::CLEANUP_ORPHAN_BLOB);
                tracing::error!(
                    storage_name = %name,
                    "No runtime to remove blob of cancelled upload; left as orphan"
                );
            }
        }
    }
}

async fn remove_orphan(storage: &dyn BlobStore, name: &StorageName) {
    match storage.delete(name).await {
        Ok(()) => tracing::debug!(storage_name = %name, "Removed uncataloged blob"),
        Err(e) => {
            metrics::record_cleanup_failure(metrics::CLEANUP_ORPHAN_BLOB);
            tracing::error!(
                storage_name = %name,
                error = %e,
                "Failed to remove uncataloged blob; left as orphan for reconciliation"
            );
        }
    }
}
