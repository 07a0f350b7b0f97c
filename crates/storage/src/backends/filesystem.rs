//! Local filesystem storage backend.
//!
//! Blobs live directly in a flat content directory. Writes go to
//! `<name>.tmp.<uuid>` in the same directory and are renamed into place once
//! synced, so the final name only ever refers to a complete file.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobEntry, BlobMeta, BlobStore, ByteStream, StreamingUpload};
use async_trait::async_trait;
use bytes::Bytes;
use stash_core::StorageName;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Marker separating a blob name from the unique suffix of its temp file.
const TEMP_MARKER: &str = ".tmp.";

/// Whether a directory entry is an in-flight temp file rather than a blob.
pub fn is_temp_name(file_name: &str) -> bool {
    file_name.contains(TEMP_MARKER)
}

fn map_not_found(name: &StorageName) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Local filesystem blob store.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the content directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Content directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the full path for a blob, rejecting symlinks that escape the root.
    ///
    /// Runs on the blocking pool since `canonicalize` and `symlink_metadata`
    /// are synchronous.
    async fn blob_path(&self, name: &StorageName) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let name = name.clone();
        tokio::task::spawn_blocking(move || Self::blob_path_sync(&root, &name))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    fn blob_path_sync(root: &Path, name: &StorageName) -> StorageResult<PathBuf> {
        // Must be exactly one normal component.
        let mut components = Path::new(name.as_str()).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        ) {
            return Err(StorageError::InvalidKey(format!(
                "not a single path component: {name}"
            )));
        }

        let path = root.join(name.as_str());

        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let root_canonical = root.canonicalize()?;
                let canonical = path.canonicalize().map_err(|_| {
                    StorageError::InvalidKey(format!("symlink target missing or invalid: {name}"))
                })?;
                if !canonical.starts_with(&root_canonical) {
                    return Err(StorageError::InvalidKey(format!(
                        "resolved path escapes storage root: {name}"
                    )));
                }
                Ok(path)
            }
            Ok(_) => Ok(path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path),
            Err(err) => Err(StorageError::Io(std::io::Error::new(
                err.kind(),
                format!("failed to stat path: {err}"),
            ))),
        }
    }

    fn temp_path(&self, name: &StorageName) -> PathBuf {
        self.root.join(format!("{name}{TEMP_MARKER}{}", Uuid::new_v4()))
    }
}

#[async_trait]
impl BlobStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, name: &StorageName) -> StorageResult<bool> {
        let path = self.blob_path(name).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, name: &StorageName) -> StorageResult<BlobMeta> {
        let path = self.blob_path(name).await?;
        let metadata = fs::metadata(&path).await.map_err(map_not_found(name))?;

        Ok(BlobMeta {
            size: metadata.len(),
            last_modified: metadata.modified().ok().map(Into::into),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, name: &StorageName) -> StorageResult<Bytes> {
        let path = self.blob_path(name).await?;
        let data = fs::read(&path).await.map_err(map_not_found(name))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, name: &StorageName) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.blob_path(name).await?;
        let file = fs::File::open(&path).await.map_err(map_not_found(name))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, name: &StorageName, data: Bytes) -> StorageResult<u64> {
        let mut upload = self.put_stream(name).await?;
        upload.write(data).await?;
        upload.finish().await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_stream(&self, name: &StorageName) -> StorageResult<Box<dyn StreamingUpload>> {
        let final_path = self.blob_path(name).await?;
        let temp_path = self.temp_path(name);
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FilesystemUpload {
            file: Some(file),
            temp_path,
            final_path,
            bytes_written: 0,
            settled: false,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, name: &StorageName) -> StorageResult<()> {
        let path = self.blob_path(name).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self) -> StorageResult<Vec<BlobEntry>> {
        let mut results = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            // file_type() does not follow symlinks; links are never blobs.
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if is_temp_name(file_name) {
                continue;
            }
            let Ok(name) = StorageName::parse(file_name) else {
                tracing::debug!(file_name, "Skipping foreign file in content directory");
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Deleted between read_dir and stat.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            results.push(BlobEntry {
                name,
                size: metadata.len(),
                last_modified: metadata.modified().ok().map(Into::into),
            });
        }
        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

/// Streaming upload for filesystem backend.
struct FilesystemUpload {
    file: Option<fs::File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
    /// Set once the temp file has been renamed or removed.
    settled: bool,
}

#[async_trait]
impl StreamingUpload for FilesystemUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Io(std::io::Error::other("upload already closed")))?;
        file.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            // Data must be on disk before the rename makes it visible.
            file.sync_all().await?;
        }
        fs::rename(&self.temp_path, &self.final_path).await?;
        self.settled = true;
        Ok(self.bytes_written)
    }

    async fn abort(mut self: Box<Self>) -> StorageResult<()> {
        drop(self.file.take());
        let result = match fs::remove_file(&self.temp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        };
        self.settled = true;
        result
    }
}

impl Drop for FilesystemUpload {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // Cancelled mid-write (request future dropped) or finish failed.
        drop(self.file.take());
        if let Err(e) = std::fs::remove_file(&self.temp_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %self.temp_path.display(),
                error = %e,
                "Failed to remove abandoned upload temp file"
            );
        }
    }
}
