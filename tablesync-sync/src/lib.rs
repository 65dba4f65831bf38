//! I/O layer and job runner for tablesync.
//!
//! The engine crate decides what to change; this crate reads both stores,
//! applies the decision and keeps the bookkeeping.
//!
//! ## Components
//!
//! - **Store traits**: [`SheetStore`], [`RemoteTable`], [`EventNotifier`]
//! - **Sheets**: Google Sheets v4 client ([`SheetsClient`])
//! - **Remote**: Glide-style `queryTables` / `mutateTables` client
//!   ([`GlideTable`]) and the response-shape parser
//! - **Notifier**: webhook delivery with a shared-secret header
//! - **Metadata**: a [`tablesync_storage::MetaStore`] kept in a sheet tab
//! - **Log sinks**: sheet tabs, `tracing`, in-memory
//! - **Jobs**: [`run_job`] for the four sync modes
//!
//! ## Run sequence
//!
//! 1. Load metadata
//! 2. Ensure the sheet header, read and index both sides
//! 3. Skip when digests show nothing changed (one-way modes)
//! 4. Reconcile into a [`tablesync_engine::MutationPlan`]
//! 5. Apply remote mutations, then sheet cells, deletes, appends
//! 6. Commit metadata once
//! 7. Emit gated events
//! 8. Write the change log and run summary

pub mod config;
mod error;
pub mod glide;
mod http;
pub mod job;
pub mod log;
pub mod meta_sheet;
pub mod notifier;
pub mod response;
pub mod retry;
pub mod sheets;
pub mod store;

pub use config::{
    AppConfig, JobConfig, JobMode, LogConfig, MetaBackend, Secrets, SecretsConfig, WriteMode,
};
pub use error::{SyncError, SyncResult, TRANSIENT_STATUSES};
pub use glide::{GlideConfig, GlideTable};
pub use job::{run_job, JobReport, RunOptions, SyncContext};
pub use log::{LogSink, MemorySink, MultiSink, SheetLogConfig, SheetLogSink, TracingSink};
pub use meta_sheet::SheetMetaStore;
pub use notifier::{WebhookConfig, WebhookNotifier, SECRET_HEADER};
pub use response::{parse_query_response, QueryPage};
pub use retry::RetryPolicy;
pub use sheets::{column_letter, SheetsClient, SheetsConfig};
pub use store::{
    CellWrite, Delivery, EventNotifier, RemoteMutation, RemoteRead, RemoteTable, SheetStore,
};
