//! Collaborator traits for the two backing stores and the event sink.
//!
//! The job runner only talks to these traits. HTTP implementations live in
//! [`crate::sheets`], [`crate::glide`] and [`crate::notifier`]; tests use
//! in-memory fakes.

use crate::error::SyncResult;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tablesync_engine::union_headers;

/// One cell to overwrite on a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    /// Zero-based body position (sheet row = position + 2).
    pub position: usize,
    /// Zero-based column.
    pub column: usize,
    pub value: String,
}

/// Spreadsheet-like store: named tabs, a header row, positional body rows.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Creates the tab if it does not exist.
    async fn ensure_table(&self, table: &str) -> SyncResult<()>;

    /// Returns the header row. Names are trimmed; empty cells are kept so
    /// positions stay aligned.
    async fn list_fields(&self, table: &str) -> SyncResult<Vec<String>>;

    /// Overwrites the header row.
    async fn write_header(&self, table: &str, header: &[String]) -> SyncResult<()>;

    /// Returns every body row, each at most `width` cells wide.
    async fn read_all(&self, table: &str, width: usize) -> SyncResult<Vec<Vec<String>>>;

    /// Overwrites individual cells.
    async fn write_cells(&self, table: &str, cells: &[CellWrite]) -> SyncResult<()>;

    /// Appends rows after the last body row.
    async fn append_rows(&self, table: &str, rows: &[Vec<String>]) -> SyncResult<()>;

    /// Deletes body rows by position. Implementations delete the highest
    /// position first so earlier positions stay valid.
    async fn delete_rows(&self, table: &str, positions: &[usize]) -> SyncResult<()>;

    /// Replaces the whole body (everything below the header).
    async fn replace_body(&self, table: &str, rows: &[Vec<String>]) -> SyncResult<()>;

    /// Adds any `required` header missing from the tab and returns the
    /// resulting header. Existing columns never move.
    async fn ensure_fields(&self, table: &str, required: &[String]) -> SyncResult<Vec<String>> {
        let existing = self.list_fields(table).await?;
        let header = union_headers(&existing, required);
        if header != existing {
            self.write_header(table, &header).await?;
        }
        Ok(header)
    }
}

/// Result of reading a remote table.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRead {
    /// Every row, across all pages.
    Rows(Vec<Map<String, Value>>),
    /// The response did not match any known shape. Carries a short
    /// description for the log.
    Unrecognized(String),
}

/// One remote mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteMutation {
    Add { values: Map<String, Value> },
    Update { row_id: String, values: Map<String, Value> },
}

/// Remote tabular API bound to one table.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Table name, for logging.
    fn name(&self) -> &str;

    /// Reads every row, following pagination.
    async fn read_all(&self) -> SyncResult<RemoteRead>;

    /// Creates a row and returns its row id when the API reports one.
    async fn add_record(&self, values: Map<String, Value>) -> SyncResult<Option<String>>;

    /// Overwrites the given columns of an existing row.
    async fn update_record(&self, row_id: &str, values: Map<String, Value>) -> SyncResult<()>;

    /// Submits mutations, returning one result per mutation: the new row id
    /// for adds, `None` for updates.
    async fn apply_batch(&self, mutations: Vec<RemoteMutation>) -> SyncResult<Vec<Option<String>>> {
        let mut out = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            match mutation {
                RemoteMutation::Add { values } => out.push(self.add_record(values).await?),
                RemoteMutation::Update { row_id, values } => {
                    self.update_record(&row_id, values).await?;
                    out.push(None);
                }
            }
        }
        Ok(out)
    }
}

/// What happened to an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered { status: u16 },
    /// No endpoint configured; nothing was sent.
    Disabled,
}

/// Sink for trigger events.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn emit(&self, kind: &str, payload: Value) -> SyncResult<Delivery>;
}
