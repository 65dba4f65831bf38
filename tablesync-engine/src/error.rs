//! Error types for the reconciliation engine.

use thiserror::Error;

/// Errors that can occur while preparing or computing a reconciliation.
///
/// Reconciliation itself never fails on data: unparsable timestamps,
/// empty keys and duplicates all have defined outcomes. What remains are
/// configuration problems detected before any plan is computed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Types(#[from] tablesync_types::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
