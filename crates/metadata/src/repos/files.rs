//! File catalog repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use stash_core::{FileId, FileRecord, NewFileRecord, StorageName};

/// Repository for cataloged files.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Insert a record, assigning it a new id.
    ///
    /// Returns `AlreadyExists` if the storage name is already cataloged.
    async fn insert_file(&self, file: &NewFileRecord) -> MetadataResult<FileRecord>;

    /// All records, newest upload first. Ties are broken by id, newest first.
    async fn list_files(&self) -> MetadataResult<Vec<FileRecord>>;

    /// Get a record by id.
    async fn get_file(&self, id: FileId) -> MetadataResult<Option<FileRecord>>;

    /// Get a record by the name its blob is stored under.
    async fn get_file_by_storage_name(
        &self,
        storage_name: &StorageName,
    ) -> MetadataResult<Option<FileRecord>>;

    /// Delete a record. Returns `NotFound` if no record has this id.
    ///
    /// Only the catalog entry is removed; the blob is left to the caller.
    async fn delete_file(&self, id: FileId) -> MetadataResult<()>;

    /// Number of cataloged files.
    async fn count_files(&self) -> MetadataResult<u64>;
}
