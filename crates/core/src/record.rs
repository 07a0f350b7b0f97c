//! File records: the catalog entity describing one uploaded file.

use crate::naming::StorageName;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for a cataloged file.
///
/// UUIDv7, so ids sort by creation time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(Uuid);

impl FileId {
    /// Generate a new time-ordered file ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidFileId(format!("{s:?}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalize a timestamp to UTC with millisecond precision, the resolution
/// every catalog backend round-trips exactly.
fn to_catalog_precision(t: OffsetDateTime) -> OffsetDateTime {
    let t = t.to_offset(time::UtcOffset::UTC);
    t.replace_millisecond(t.millisecond()).unwrap_or(t)
}

/// Public path of a blob: `<prefix>/<storage name>`.
pub fn public_path(prefix: &str, storage_name: &StorageName) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), storage_name)
}

/// A file record that has not been cataloged yet (no id).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFileRecord {
    storage_name: StorageName,
    original_name: String,
    mime_type: String,
    size_bytes: u64,
    storage_path: String,
    uploaded_at: OffsetDateTime,
}

impl NewFileRecord {
    /// Build a record for a blob that has been fully written.
    ///
    /// The upload timestamp defaults to now. Empty original names or mime
    /// types are rejected.
    pub fn new(
        storage_name: StorageName,
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        public_prefix: &str,
    ) -> crate::Result<Self> {
        let original_name = original_name.into();
        let mime_type = mime_type.into();
        if original_name.trim().is_empty() {
            return Err(crate::Error::InvalidRecord(
                "original name cannot be empty".to_string(),
            ));
        }
        if mime_type.trim().is_empty() {
            return Err(crate::Error::InvalidRecord(
                "mime type cannot be empty".to_string(),
            ));
        }
        if i64::try_from(size_bytes).is_err() {
            return Err(crate::Error::InvalidRecord(format!(
                "size {size_bytes} out of range"
            )));
        }
        let storage_path = public_path(public_prefix, &storage_name);
        Ok(Self {
            storage_name,
            original_name,
            mime_type,
            size_bytes,
            storage_path,
            uploaded_at: to_catalog_precision(OffsetDateTime::now_utc()),
        })
    }

    /// Override the upload timestamp (normalized to UTC milliseconds).
    pub fn with_uploaded_at(mut self, uploaded_at: OffsetDateTime) -> Self {
        self.uploaded_at = to_catalog_precision(uploaded_at);
        self
    }

    pub fn storage_name(&self) -> &StorageName {
        &self.storage_name
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    pub fn uploaded_at(&self) -> OffsetDateTime {
        self.uploaded_at
    }

    /// Attach a catalog-assigned id.
    pub fn into_record(self, id: FileId) -> FileRecord {
        FileRecord {
            id,
            storage_name: self.storage_name,
            original_name: self.original_name,
            mime_type: self.mime_type,
            size_bytes: self.size_bytes,
            storage_path: self.storage_path,
            uploaded_at: self.uploaded_at,
        }
    }
}

/// A cataloged file.
///
/// Serialized with the field names clients of the HTTP API expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Name the blob is stored under.
    #[serde(rename = "filename")]
    pub storage_name: StorageName,
    /// Client-supplied display name.
    #[serde(rename = "originalname")]
    pub original_name: String,
    #[serde(rename = "mimetype")]
    pub mime_type: String,
    /// Bytes actually written.
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "path")]
    pub storage_path: String,
    #[serde(rename = "uploadDate", with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
}
