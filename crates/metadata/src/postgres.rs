//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{FileRow, into_records};
use crate::repos::FileRepo;
use crate::store::MetadataStore;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use stash_core::{FileId, FileRecord, NewFileRecord, StorageName};
use std::str::FromStr;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect using a connection URL and create the schema if needed.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::from_str(url)?;

        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
            tracing::info!(timeout_ms, "PostgreSQL statement_timeout set");
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(max_connections, "Connected to PostgreSQL catalog");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements hold one statement each.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl FileRepo for PostgresStore {
    async fn insert_file(&self, file: &NewFileRecord) -> MetadataResult<FileRecord> {
        let id = FileId::new();
        let row = FileRow::new(id, file)?;
        sqlx::query(
            r#"
            INSERT INTO files (
                file_id, storage_name, original_name, mime_type,
                size_bytes, storage_path, uploaded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
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
        row.into_record()
    }

    async fn list_files(&self) -> MetadataResult<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(
            "SELECT * FROM files ORDER BY uploaded_at DESC, file_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        into_records(rows)
    }

    async fn get_file(&self, id: FileId) -> MetadataResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE file_id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(FileRow::into_record).transpose()
    }

    async fn get_file_by_storage_name(
        &self,
        storage_name: &StorageName,
    ) -> MetadataResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE storage_name = $1")
            .bind(storage_name.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(FileRow::into_record).transpose()
    }

    async fn delete_file(&self, id: FileId) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM files WHERE file_id = $1")
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
