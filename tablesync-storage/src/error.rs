//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A store lock was poisoned by a panicking holder.
    #[error("store lock poisoned")]
    Poisoned,

    /// Error reported by a store kept in a remote backend.
    #[error("backend error: {0}")]
    Backend(String),
}
