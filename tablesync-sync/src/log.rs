//! Destinations for change-log entries and run summaries.

use crate::error::SyncResult;
use crate::store::SheetStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tablesync_engine::{ChangeEntry, RunSummary};
use tracing::{debug, info};

/// Receives the change log of one run.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write(&self, entries: &[ChangeEntry], summary: &RunSummary) -> SyncResult<()>;
}

/// Writes through `tracing`: the summary at info, each entry at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl LogSink for TracingSink {
    async fn write(&self, entries: &[ChangeEntry], summary: &RunSummary) -> SyncResult<()> {
        for entry in entries {
            debug!(
                run_id = %entry.run_id,
                action = %entry.action,
                side = %entry.side,
                key = %entry.key,
                location = %entry.location,
                field = %entry.field,
                old = %entry.old_value,
                new = %entry.new_value,
                "change"
            );
        }
        let counts = summary.counts.unwrap_or_default();
        info!(
            run_id = %summary.run_id,
            job = %summary.job,
            outcome = %summary.outcome,
            inserted = counts.inserted,
            updated = counts.updated,
            deleted = counts.deleted,
            duplicates = counts.duplicates,
            emitted = summary.emitted,
            message = %summary.message,
            "run finished"
        );
        Ok(())
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<ChangeEntry>>,
    summaries: Mutex<Vec<RunSummary>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<ChangeEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<RunSummary> {
        self.summaries.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write(&self, entries: &[ChangeEntry], summary: &RunSummary) -> SyncResult<()> {
        if let Ok(mut stored) = self.entries.lock() {
            stored.extend_from_slice(entries);
        }
        if let Ok(mut stored) = self.summaries.lock() {
            stored.push(summary.clone());
        }
        Ok(())
    }
}

/// Log tab names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLogConfig {
    pub details_tab: String,
    pub summary_tab: String,
}

impl Default for SheetLogConfig {
    fn default() -> Self {
        Self {
            details_tab: "change_details".to_string(),
            summary_tab: "sync_summary".to_string(),
        }
    }
}

/// Appends entries and summaries to two sheet tabs. Headers are ensured
/// before each append.
#[derive(Debug)]
pub struct SheetLogSink<S> {
    sheets: Arc<S>,
    config: SheetLogConfig,
}

impl<S: SheetStore> SheetLogSink<S> {
    pub fn new(sheets: Arc<S>, config: SheetLogConfig) -> Self {
        Self { sheets, config }
    }

    async fn append(&self, tab: &str, header: &[&str], rows: Vec<Vec<String>>) -> SyncResult<()> {
        let header: Vec<String> = header.iter().map(|h| (*h).to_string()).collect();
        self.sheets.ensure_table(tab).await?;
        self.sheets.ensure_fields(tab, &header).await?;
        self.sheets.append_rows(tab, &rows).await
    }
}

#[async_trait]
impl<S: SheetStore> LogSink for SheetLogSink<S> {
    async fn write(&self, entries: &[ChangeEntry], summary: &RunSummary) -> SyncResult<()> {
        if !entries.is_empty() {
            let rows = entries.iter().map(ChangeEntry::to_row).collect();
            self.append(&self.config.details_tab, ChangeEntry::HEADER, rows)
                .await?;
        }
        self.append(&self.config.summary_tab, RunSummary::HEADER, vec![summary.to_row()])
            .await
    }
}

/// Fans out to several sinks, stopping at the first failure.
pub struct MultiSink {
    sinks: Vec<Box<dyn LogSink>>,
}

impl MultiSink {
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn LogSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl LogSink for MultiSink {
    async fn write(&self, entries: &[ChangeEntry], summary: &RunSummary) -> SyncResult<()> {
        for sink in &self.sinks {
            sink.write(entries, summary).await?;
        }
        Ok(())
    }
}
