//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use stash_core::StorageName;
use std::pin::Pin;
use time::OffsetDateTime;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Blob store for uploaded file contents.
///
/// Blobs are addressed by [`StorageName`]. Writes are atomic: a reader never
/// observes a partially written blob under its final name.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Check if a blob exists.
    async fn exists(&self, name: &StorageName) -> StorageResult<bool>;

    /// Get blob metadata.
    async fn head(&self, name: &StorageName) -> StorageResult<BlobMeta>;

    /// Read a whole blob into memory.
    async fn get(&self, name: &StorageName) -> StorageResult<Bytes>;

    /// Read a blob as a stream.
    async fn get_stream(&self, name: &StorageName) -> StorageResult<ByteStream>;

    /// Write a blob atomically, returning the number of bytes written.
    async fn put(&self, name: &StorageName, data: Bytes) -> StorageResult<u64>;

    /// Begin a streaming write. Nothing is visible under `name` until
    /// [`StreamingUpload::finish`] succeeds.
    async fn put_stream(&self, name: &StorageName) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Delete a blob. Deleting a blob that does not exist succeeds.
    async fn delete(&self, name: &StorageName) -> StorageResult<()>;

    /// List completed blobs. In-flight uploads are not included.
    async fn list(&self) -> StorageResult<Vec<BlobEntry>>;

    /// Get the backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Check that the backend is reachable and writable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Blob metadata.
#[derive(Clone, Debug)]
pub struct BlobMeta {
    /// Size in bytes.
    pub size: u64,
    /// Last modified time.
    pub last_modified: Option<OffsetDateTime>,
}

/// A listed blob.
#[derive(Clone, Debug)]
pub struct BlobEntry {
    pub name: StorageName,
    pub size: u64,
    pub last_modified: Option<OffsetDateTime>,
}

/// A streaming write in progress.
///
/// Dropping an upload without calling `finish` or `abort` discards the
/// partial data.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Write a chunk.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Make the blob durable and visible under its final name.
    /// Returns the total number of bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Discard everything written so far.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}

/// Stream `data` into `store` under `name`, returning the bytes written.
///
/// If the source stream yields an error or a write fails, the partial upload
/// is aborted and the error returned; no blob appears under `name`.
pub async fn write_stream<S, E>(
    store: &dyn BlobStore,
    name: &StorageName,
    data: S,
) -> Result<u64, E>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: From<StorageError>,
{
    let mut upload = store.put_stream(name).await?;
    futures::pin_mut!(data);

    while let Some(chunk) = data.next().await {
        let result = match chunk {
            Ok(chunk) => upload.write(chunk).await.map_err(E::from),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            if let Err(abort_err) = upload.abort().await {
                tracing::warn!(
                    storage_name = %name,
                    error = %abort_err,
                    "Failed to abort partial upload"
                );
            }
            return Err(e);
        }
    }

    Ok(upload.finish().await?)
}
