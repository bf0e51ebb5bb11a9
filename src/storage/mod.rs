//! Storage abstractions for record persistence.
//!
//! The store is the single source of truth for harvested records. Its
//! unique index on the fingerprint column is the hard backstop for
//! duplicate detection; the application adds no locking of its own.

pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Record;

// Re-export for convenience
pub use sqlite::SqliteStore;

/// Trait for record storage backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record. A fingerprint collision surfaces as an error for
    /// which [`crate::error::AppError::is_unique_violation`] returns true.
    async fn insert(&self, record: &Record) -> Result<()>;

    /// Look up a record by its fingerprint.
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Record>>;

    /// All stored records, newest occurrence first.
    async fn list_all(&self) -> Result<Vec<Record>>;

    /// Delete records whose occurrence timestamp is older than the cutoff.
    /// Returns the number of deleted rows.
    async fn delete_older_than(&self, cutoff: i64) -> Result<u64>;
}
