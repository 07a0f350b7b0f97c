//! Core domain types and shared logic for the stash upload service.
//!
//! This crate defines the data model used across all other crates:
//! - File records and identifiers
//! - Storage name generation
//! - Upload admission policy (content-type allow-list and size ceiling)
//! - Configuration

pub mod config;
pub mod error;
pub mod gate;
pub mod naming;
pub mod record;

pub use config::UploadPolicy;
pub use error::{Error, Result};
pub use gate::{Gate, Rejection};
pub use naming::StorageName;
pub use record::{FileId, FileRecord, NewFileRecord};

/// Default maximum upload size: 10 MiB
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Content types accepted when no allow-list is configured.
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "application/pdf"];

/// Public path prefix under which blobs are served.
pub const DEFAULT_PUBLIC_PREFIX: &str = "/uploads";
