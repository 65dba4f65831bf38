//! Metadata table kept in a sheet tab (`key | value`).

use crate::error::SyncError;
use crate::store::SheetStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tablesync_storage::{MetaStore, StorageError, StorageResult};
use tablesync_types::MetaMap;
use tracing::debug;

const HEADER: [&str; 2] = ["key", "value"];

fn backend(e: SyncError) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// [`MetaStore`] over a two-column sheet tab.
#[derive(Debug)]
pub struct SheetMetaStore<S> {
    sheets: Arc<S>,
    tab: String,
}

impl<S: SheetStore> SheetMetaStore<S> {
    pub fn new(sheets: Arc<S>, tab: impl Into<String>) -> Self {
        Self {
            sheets,
            tab: tab.into(),
        }
    }

    async fn read_entries(&self) -> Result<BTreeMap<String, String>, SyncError> {
        let header: Vec<String> = HEADER.iter().map(|h| (*h).to_string()).collect();
        self.sheets.ensure_table(&self.tab).await?;
        self.sheets.ensure_fields(&self.tab, &header).await?;
        let rows = self.sheets.read_all(&self.tab, HEADER.len()).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let key = cells.next()?.trim().to_string();
                let value = cells.next().unwrap_or_default();
                (!key.is_empty()).then_some((key, value))
            })
            .collect())
    }
}

#[async_trait]
impl<S: SheetStore> MetaStore for SheetMetaStore<S> {
    async fn load(&self) -> StorageResult<MetaMap> {
        let entries = self.read_entries().await.map_err(backend)?;
        debug!(tab = %self.tab, entries = entries.len(), "loaded metadata");
        Ok(MetaMap::from_entries(entries))
    }

    async fn commit(&self, meta: &MetaMap) -> StorageResult<()> {
        let mut entries = self.read_entries().await.map_err(backend)?;
        for (key, value) in meta.entries() {
            entries.insert(key.to_string(), value.to_string());
        }
        let rows: Vec<Vec<String>> = entries.into_iter().map(|(k, v)| vec![k, v]).collect();
        self.sheets
            .replace_body(&self.tab, &rows)
            .await
            .map_err(backend)?;
        debug!(tab = %self.tab, entries = rows.len(), "committed metadata");
        Ok(())
    }
}
