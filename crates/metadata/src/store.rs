//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{FileRow, into_records};
use crate::repos::FileRepo;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use stash_core::{FileId, FileRecord, NewFileRecord, StorageName};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: FileRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Create a new SQLite store, creating the database file and schema if needed.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout = Duration::from_secs(query_timeout_secs.unwrap_or(30));

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers and avoids "database is locked".
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout,
        };
        store.migrate().await?;

        tracing::info!(path = %path.display(), "Opened SQLite catalog");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// SQLite cannot cancel statements; slow ones are only reported.
    fn warn_if_slow(&self, operation: &'static str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed > self.query_timeout {
            tracing::warn!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = self.query_timeout.as_millis() as u64,
                "SQLite query exceeded advisory timeout"
            );
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl FileRepo for SqliteStore {
    async fn insert_file(&self, file: &NewFileRecord) -> MetadataResult<FileRecord> {
        let started = Instant::now();
        let id = FileId::new();
        let row = FileRow::new(id, file)?;
        sqlx::query(
            r#"
            INSERT INTO files (
                file_id, storage_name, original_name, mime_type,
                size_bytes, storage_path, uploaded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.file_id)
        .bind(&row.storage_name)
        .bind(&row.original_name)
        .bind(&row.mime_type)
        .bind(row.size_bytes)
        .bind(&row.storage_path)
        .bind(row.uploaded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, || format!("storage name {}", row.storage_name))
        })?;
        self.warn_if_slow("insert_file", started);
        row.into_record()
    }

    async fn list_files(&self) -> MetadataResult<Vec<FileRecord>> {
        let started = Instant::now();
        let rows = sqlx::query_as::<_, FileRow>(
            // Timestamps are stored as RFC 3339 text, which does not sort
            // lexicographically across fractional-second widths.
            "SELECT * FROM files ORDER BY julianday(uploaded_at) DESC, file_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        self.warn_if_slow("list_files", started);
        into_records(rows)
    }

    async fn get_file(&self, id: FileId) -> MetadataResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE file_id = ?")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(FileRow::into_record).transpose()
    }

    async fn get_file_by_storage_name(
        &self,
        storage_name: &StorageName,
    ) -> MetadataResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE storage_name = ?")
            .bind(storage_name.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(FileRow::into_record).transpose()
    }

    async fn delete_file(&self, id: FileId) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM files WHERE file_id = ?")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("file {id}")));
        }
        Ok(())
    }

    async fn count_files(&self) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    file_id BLOB PRIMARY KEY NOT NULL,
    storage_name TEXT NOT NULL UNIQUE,
    original_name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL CHECK (size_bytes >= 0),
    storage_path TEXT NOT NULL,
    uploaded_at TEXT NOT NULL
);
"#;
