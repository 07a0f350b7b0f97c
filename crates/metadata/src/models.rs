//! Database models mapping to the catalog schema.

use crate::error::{MetadataError, MetadataResult};
use sqlx::FromRow;
use stash_core::{FileId, FileRecord, NewFileRecord, StorageName};
use time::OffsetDateTime;
use uuid::Uuid;

/// Catalog row for one uploaded file.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    pub file_id: Uuid,
    pub storage_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub uploaded_at: OffsetDateTime,
}

impl FileRow {
    /// Build the row for a new record with a freshly assigned id.
    pub fn new(id: FileId, file: &NewFileRecord) -> MetadataResult<Self> {
        let size_bytes = i64::try_from(file.size_bytes()).map_err(|_| {
            MetadataError::Internal(format!("size {} out of range", file.size_bytes()))
        })?;
        Ok(Self {
            file_id: *id.as_uuid(),
            storage_name: file.storage_name().to_string(),
            original_name: file.original_name().to_string(),
            mime_type: file.mime_type().to_string(),
            size_bytes,
            storage_path: file.storage_path().to_string(),
            uploaded_at: file.uploaded_at(),
        })
    }

    /// Convert into the domain record, validating stored values.
    pub fn into_record(self) -> MetadataResult<FileRecord> {
        let storage_name = StorageName::parse(&self.storage_name).map_err(|e| {
            MetadataError::Internal(format!("corrupt row {}: {e}", self.file_id))
        })?;
        let size_bytes = u64::try_from(self.size_bytes).map_err(|_| {
            MetadataError::Internal(format!(
                "corrupt row {}: negative size {}",
                self.file_id, self.size_bytes
            ))
        })?;
        Ok(FileRecord {
            id: FileId::from_uuid(self.file_id),
            storage_name,
            original_name: self.original_name,
            mime_type: self.mime_type,
            size_bytes,
            storage_path: self.storage_path,
            uploaded_at: self.uploaded_at,
        })
    }
}

pub(crate) fn into_records(rows: Vec<FileRow>) -> MetadataResult<Vec<FileRecord>> {
    rows.into_iter().map(FileRow::into_record).collect()
}
