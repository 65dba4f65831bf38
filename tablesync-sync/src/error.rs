//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// HTTP statuses retried at the I/O boundary.
pub const TRANSIENT_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or inconsistent configuration. Raised before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection reset, broken pipe, timeout and similar.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// Non-success HTTP response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A backend response could not be interpreted.
    #[error("unrecognized response shape: {0}")]
    DataShape(String),

    /// Event notification failed after retries.
    #[error("notification failed: {0}")]
    Notification(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metadata store error.
    #[error("storage error: {0}")]
    Storage(#[from] tablesync_storage::StorageError),

    /// Reconciliation setup error.
    #[error(transparent)]
    Engine(#[from] tablesync_engine::EngineError),

    /// Invalid core type.
    #[error(transparent)]
    Types(#[from] tablesync_types::Error),

    /// IO error (config file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Returns true if the operation may succeed when retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransientIo(_) => true,
            Self::Http { status, .. } => TRANSIENT_STATUSES.contains(status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::DataShape(e.to_string());
        }
        if let Some(status) = e.status() {
            return Self::Http {
                status: status.as_u16(),
                body: e.to_string(),
            };
        }
        Self::TransientIo(e.to_string())
    }
}
