// src/storage/sqlite.rs

//! SQLite-backed record store.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::Result;
use crate::models::Record;
use crate::storage::RecordStore;

/// Kept low for SQLite since it uses file-level locking.
const MAX_CONNECTIONS: u32 = 5;

/// SQLite storage backend.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if necessary) the database at the given path and
    /// ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // WAL keeps feed reads unblocked while a pass is committing.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory database, used by tests.
    ///
    /// A single connection is required: every pooled connection would
    /// otherwise get its own private memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL,
                description TEXT NOT NULL,
                location    TEXT NOT NULL,
                link        TEXT NOT NULL,
                occurred_at INTEGER NOT NULL,
                fingerprint TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Range deletions during pruning scan by occurrence timestamp.
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_occurred_at ON records (occurred_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, record: &Record) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (title, description, location, link, occurred_at, fingerprint)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.location)
        .bind(&record.link)
        .bind(record.occurred_at)
        .bind(&record.fingerprint)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Record>> {
        let record = sqlx::query_as::<_, Record>(
            r#"
            SELECT title, description, location, link, occurred_at, fingerprint
            FROM records
            WHERE fingerprint = ?1
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        let records = sqlx::query_as::<_, Record>(
            r#"
            SELECT title, description, location, link, occurred_at, fingerprint
            FROM records
            ORDER BY occurred_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn delete_older_than(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM records WHERE occurred_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
