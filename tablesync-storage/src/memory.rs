//! In-process metadata store.

use crate::{MetaStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tablesync_types::MetaMap;

/// Metadata kept in memory. Counts commits so callers can assert on
/// whether a run persisted anything.
#[derive(Debug, Default)]
pub struct MemoryMetaStore {
    entries: Mutex<BTreeMap<String, String>>,
    commits: Mutex<usize>,
}

impl MemoryMetaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with raw entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            commits: Mutex::new(0),
        }
    }

    /// Number of successful commits.
    pub fn commits(&self) -> StorageResult<usize> {
        self.commits.lock().map(|c| *c).map_err(|_| StorageError::Poisoned)
    }

    /// Snapshot of the stored entries.
    pub fn snapshot(&self) -> StorageResult<BTreeMap<String, String>> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .map_err(|_| StorageError::Poisoned)
    }
}

#[async_trait]
impl MetaStore for MemoryMetaStore {
    async fn load(&self) -> StorageResult<MetaMap> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(MetaMap::from_entries(entries.clone()))
    }

    async fn commit(&self, meta: &MetaMap) -> StorageResult<()> {
        {
            let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
            for (key, value) in meta.entries() {
                entries.insert(key.to_string(), value.to_string());
            }
        }
        let mut commits = self.commits.lock().map_err(|_| StorageError::Poisoned)?;
        *commits += 1;
        Ok(())
    }
}
