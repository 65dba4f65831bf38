//! Metadata storage for tablesync.
//!
//! The metadata area is a flat key/value table holding the last committed
//! digest per sync scope and one-time trigger flags. It is loaded once at
//! the start of a run and committed once at the end; a failed run commits
//! nothing.
//!
//! # Backends
//!
//! - [`SqliteMetaStore`]: a local SQLite file
//! - [`MemoryMetaStore`]: in-process, for tests and dry runs
//!
//! `tablesync-sync` adds a backend that keeps the table in a sheet tab.

mod error;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryMetaStore;
pub use sqlite::SqliteMetaStore;

use async_trait::async_trait;
use tablesync_types::{MetaKey, MetaMap};

/// A persisted metadata table.
#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Loads every entry.
    async fn load(&self) -> StorageResult<MetaMap>;

    /// Persists every entry of `meta` in one write. Entries already stored
    /// but absent from `meta` are kept.
    async fn commit(&self, meta: &MetaMap) -> StorageResult<()>;

    /// Reads a single entry.
    async fn get(&self, key: &MetaKey) -> StorageResult<Option<String>> {
        Ok(self.load().await?.get(key).map(str::to_string))
    }

    /// Writes a single entry.
    async fn set(&self, key: &MetaKey, value: &str) -> StorageResult<()> {
        let mut meta = self.load().await?;
        meta.set(key, value);
        self.commit(&meta).await
    }
}
