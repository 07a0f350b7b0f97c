//! Fault-injecting store wrappers for exercising failure paths.

use async_trait::async_trait;
use bytes::Bytes;
use stash_core::{FileId, FileRecord, NewFileRecord, StorageName};
use stash_metadata::{FileRepo, MetadataError, MetadataResult, MetadataStore};
use stash_storage::{
    BlobEntry, BlobMeta, BlobStore, ByteStream, StorageError, StorageResult, StreamingUpload,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn injected_io(what: &str) -> StorageError {
    StorageError::Io(std::io::Error::other(format!("injected {what} failure")))
}

/// Catalog wrapper whose writes can be made to fail.
#[allow(dead_code)]
pub struct FaultyCatalog {
    inner: Arc<dyn MetadataStore>,
    pub fail_inserts: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub stall_inserts: AtomicBool,
}

#[allow(dead_code)]
impl FaultyCatalog {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_inserts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            stall_inserts: AtomicBool::new(false),
        })
    }

    /// Make inserts hang until the caller gives up.
    pub fn stall_inserts(&self, stall: bool) {
        self.stall_inserts.store(stall, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileRepo for FaultyCatalog {
    async fn insert_file(&self, file: &NewFileRecord) -> MetadataResult<FileRecord> {
        if self.stall_inserts.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(MetadataError::Internal(
                "injected insert failure".to_string(),
            ));
        }
        self.inner.insert_file(file).await
    }

    async fn list_files(&self) -> MetadataResult<Vec<FileRecord>> {
        self.inner.list_files().await
    }

    async fn get_file(&self, id: FileId) -> MetadataResult<Option<FileRecord>> {
        self.inner.get_file(id).await
    }

    async fn get_file_by_storage_name(
        &self,
        storage_name: &StorageName,
    ) -> MetadataResult<Option<FileRecord>> {
        self.inner.get_file_by_storage_name(storage_name).await
    }

    async fn delete_file(&self, id: FileId) -> MetadataResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(MetadataError::Internal(
                "injected delete failure".to_string(),
            ));
        }
        self.inner.delete_file(id).await
    }

    async fn count_files(&self) -> MetadataResult<u64> {
        self.inner.count_files().await
    }
}

#[async_trait]
impl MetadataStore for FaultyCatalog {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}

/// Blob store wrapper whose writes, deletes or health check can be made to fail.
#[allow(dead_code)]
pub struct FaultyBlobStore {
    inner: Arc<dyn BlobStore>,
    pub fail_writes: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub unhealthy: AtomicBool,
}

#[allow(dead_code)]
impl FaultyBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            unhealthy: AtomicBool::new(false),
        })
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn exists(&self, name: &StorageName) -> StorageResult<bool> {
        self.inner.exists(name).await
    }

    async fn head(&self, name: &StorageName) -> StorageResult<BlobMeta> {
        self.inner.head(name).await
    }

    async fn get(&self, name: &StorageName) -> StorageResult<Bytes> {
        self.inner.get(name).await
    }

    async fn get_stream(&self, name: &StorageName) -> StorageResult<ByteStream> {
        self.inner.get_stream(name).await
    }

    async fn put(&self, name: &StorageName, data: Bytes) -> StorageResult<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_io("write"));
        }
        self.inner.put(name, data).await
    }

    async fn put_stream(&self, name: &StorageName) -> StorageResult<Box<dyn StreamingUpload>> {
        let upload = self.inner.put_stream(name).await?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Ok(Box::new(FailingUpload { inner: upload }));
        }
        Ok(upload)
    }

    async fn delete(&self, name: &StorageName) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected_io("delete"));
        }
        self.inner.delete(name).await
    }

    async fn list(&self) -> StorageResult<Vec<BlobEntry>> {
        self.inner.list().await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }

    async fn health_check(&self) -> StorageResult<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(injected_io("health check"));
        }
        self.inner.health_check().await
    }
}

/// Streaming upload that accepts the first chunk and fails on the next write,
/// like a disk filling up mid-upload.
struct FailingUpload {
    inner: Box<dyn StreamingUpload>,
}

#[async_trait]
impl StreamingUpload for FailingUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.inner.write(data).await?;
        Err(injected_io("write"))
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        Err(injected_io("finish"))
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.inner.abort().await
    }
}
