//! Core type definitions for tablesync.
//!
//! This crate defines the store-agnostic types shared by the engine and the
//! I/O collaborators:
//! - Business keys and canonical records
//! - Declared field mappings between the sheet side and the remote side
//! - Typed metadata keys for digests and one-time trigger flags
//! - Timestamp parsing for "last updated at" values
//! - Run identifiers
//!
//! Nothing here performs I/O.

mod ids;
mod mapping;
mod meta;
mod record;
mod timestamp;

pub use ids::RunId;
pub use mapping::{DerivedField, FieldFormat, FieldMapping, FieldPair, TimestampFields};
pub use meta::{MetaKey, MetaMap, DIGEST_PREFIX};
pub use record::{BusinessKey, CanonicalRecord, KeyNormalization, Side};
pub use timestamp::{format_us_date, parse_timestamp};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when building core types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid field mapping: {0}")]
    InvalidMapping(String),

    #[error("invalid metadata key: {0}")]
    InvalidMetaKey(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
