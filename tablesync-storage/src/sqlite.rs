//! SQLite-backed metadata store.

use crate::{MetaStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tablesync_types::MetaMap;
use tracing::debug;

/// Metadata store backed by a SQLite file.
#[derive(Clone)]
pub struct SqliteMetaStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetaStore {
    /// Opens (or creates) a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn load_entries(&self) -> StorageResult<MetaMap> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM meta ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MetaMap::from_entries(rows))
    }

    fn write_entries(&self, meta: &MetaMap) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO meta (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                 WHERE meta.value != excluded.value",
            )?;
            for (key, value) in meta.entries() {
                stmt.execute(params![key, value, now])?;
            }
        }
        tx.commit()?;
        debug!(entries = meta.len(), "committed metadata");
        Ok(())
    }
}

#[async_trait]
impl MetaStore for SqliteMetaStore {
    async fn load(&self) -> StorageResult<MetaMap> {
        self.load_entries()
    }

    async fn commit(&self, meta: &MetaMap) -> StorageResult<()> {
        self.write_entries(meta)
    }
}
