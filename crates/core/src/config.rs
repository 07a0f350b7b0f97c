//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Public path prefix under which stored blobs are served.
    /// Recorded in each file record as `<prefix>/<storage name>`.
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_public_prefix() -> String {
    crate::DEFAULT_PUBLIC_PREFIX.to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_prefix: default_public_prefix(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if !self.public_prefix.starts_with('/') {
            return Err(format!(
                "server.public_prefix must start with '/', got {:?}",
                self.public_prefix
            ));
        }
        let trimmed = self.public_prefix.trim_matches('/');
        if trimmed.is_empty() {
            return Err("server.public_prefix cannot be the root path".to_string());
        }
        if trimmed.contains(['{', '}', '*']) {
            return Err(format!(
                "server.public_prefix contains route syntax: {:?}",
                self.public_prefix
            ));
        }
        Ok(())
    }
}

/// Upload admission policy: which content types are accepted and how large
/// an upload may be.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Accepted content types (`type/subtype`, compared case-insensitively).
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
    /// Maximum accepted upload size in bytes (inclusive).
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
}

fn default_allowed_mime_types() -> Vec<String> {
    crate::DEFAULT_ALLOWED_MIME_TYPES
        .iter()
        .map(|m| (*m).to_string())
        .collect()
}

fn default_max_size_bytes() -> u64 {
    crate::DEFAULT_MAX_SIZE_BYTES
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_mime_types: default_allowed_mime_types(),
            max_size_bytes: default_max_size_bytes(),
        }
    }
}

impl UploadPolicy {
    /// Validate the policy.
    pub fn validate(&self) -> Result<(), String> {
        if self.allowed_mime_types.is_empty() {
            return Err("upload.allowed_mime_types cannot be empty".to_string());
        }
        for mime in &self.allowed_mime_types {
            let Some((ty, subtype)) = mime.split_once('/') else {
                return Err(format!(
                    "upload.allowed_mime_types entry {mime:?} is not of the form type/subtype"
                ));
            };
            if ty.trim().is_empty() || subtype.trim().is_empty() || mime.contains(';') {
                return Err(format!(
                    "upload.allowed_mime_types entry {mime:?} is not of the form type/subtype"
                ));
            }
        }
        if self.max_size_bytes == 0 {
            return Err("upload.max_size_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage (flat content directory).
    Filesystem {
        /// Content directory.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./uploads"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("storage.path cannot be empty".to_string())
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Metadata catalog configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (single node deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds. Advisory only: slow queries are logged,
        /// SQLite cannot cancel them.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL.
        url: String,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/catalog.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err("metadata.path cannot be empty".to_string());
                }
                Ok(())
            }
            MetadataConfig::Postgres {
                url,
                max_connections,
                ..
            } => {
                if url.trim().is_empty() {
                    return Err("metadata.url cannot be empty".to_string());
                }
                if *max_connections == 0 {
                    return Err("metadata.max_connections must be at least 1".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Orphan blob sweep configuration.
///
/// The sweep removes blobs that have no catalog record, which can be left
/// behind when compensating cleanup after a failed catalog insert also fails.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Run the sweep periodically in the background (disabled by default).
    #[serde(default)]
    pub enabled: bool,
    /// Interval in seconds between sweeps (default: 1 hour).
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    /// Blobs younger than this are never considered orphans (default: 1 hour).
    /// Must exceed the longest expected upload duration.
    #[serde(default = "default_sweep_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Report orphans without deleting them.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_sweep_grace_period_secs() -> u64 {
    3600
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sweep_interval_secs(),
            grace_period_secs: default_sweep_grace_period_secs(),
            dry_run: false,
        }
    }
}

impl SweepConfig {
    /// Get the grace period as a Duration.
    pub fn grace_period(&self) -> Duration {
        Duration::seconds(i64::try_from(self.grace_period_secs).unwrap_or(i64::MAX))
    }

    /// Get the sweep interval as a std::time::Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Validate sweep configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.interval_secs == 0 {
            return Err("sweep.interval_secs cannot be 0 when the sweep is enabled".to_string());
        }
        if self.grace_period_secs > i64::MAX as u64 {
            return Err(format!(
                "sweep.grace_period_secs {} exceeds maximum value {}",
                self.grace_period_secs,
                i64::MAX
            ));
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upload admission policy.
    #[serde(default)]
    pub upload: UploadPolicy,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata catalog configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Orphan sweep configuration.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Paths are relative and must be overridden
    /// with a scratch directory before use.
    pub fn for_testing() -> Self {
        Self::default()
    }

    /// Validate every section, returning the first error.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.upload.validate()?;
        self.storage.validate()?;
        self.metadata.validate()?;
        self.sweep.validate()?;
        Ok(())
    }
}
