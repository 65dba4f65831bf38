//! Business keys and canonical records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which of the two backing stores a record or mutation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The spreadsheet-like store (positional rows under a header row).
    Sheet,
    /// The remote tabular API (rows addressed by a remote row id).
    Remote,
}

impl Side {
    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Sheet => Self::Remote,
            Self::Remote => Self::Sheet,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sheet => write!(f, "sheet"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// How raw key cell values are normalized into a [`BusinessKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyNormalization {
    /// Use the value as-is.
    Exact,
    /// Strip surrounding whitespace.
    #[default]
    Trim,
    /// Strip surrounding whitespace and compare case-insensitively
    /// (stored upper-cased).
    CaseInsensitive,
}

impl KeyNormalization {
    /// Applies this normalization to a raw value.
    #[must_use]
    pub fn apply(self, raw: &str) -> String {
        match self {
            Self::Exact => raw.to_string(),
            Self::Trim => raw.trim().to_string(),
            Self::CaseInsensitive => raw.trim().to_uppercase(),
        }
    }
}

/// The value that identifies one logical record across both stores.
///
/// An empty key is representable; the key indexer skips such records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessKey(String);

impl BusinessKey {
    /// Builds a key from a raw cell value.
    #[must_use]
    pub fn normalize(raw: &str, mode: KeyNormalization) -> Self {
        Self(mode.apply(raw))
    }

    /// Wraps an already-normalized value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns true if the key is empty (after normalization).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BusinessKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A store-independent record: declared field name to string value.
///
/// Absent fields read as the empty string. `row_id` carries the remote row
/// identifier when the record came from (or points at) the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalRecord {
    key: BusinessKey,
    fields: BTreeMap<String, String>,
    row_id: Option<String>,
}

impl CanonicalRecord {
    /// Creates an empty record with the given key.
    #[must_use]
    pub fn new(key: BusinessKey) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
            row_id: None,
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder-style remote row id setter.
    #[must_use]
    pub fn with_row_id(mut self, row_id: impl Into<String>) -> Self {
        self.set_row_id(row_id);
        self
    }

    /// Returns the business key.
    #[must_use]
    pub fn key(&self) -> &BusinessKey {
        &self.key
    }

    /// Replaces the business key.
    pub fn set_key(&mut self, key: BusinessKey) {
        self.key = key;
    }

    /// Returns a field value, or `""` when the field is absent.
    #[must_use]
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map_or("", String::as_str)
    }

    /// Returns true if the field was explicitly set.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Sets a field value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Iterates over all set fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the remote row id, if any. Empty ids are reported as `None`.
    #[must_use]
    pub fn row_id(&self) -> Option<&str> {
        self.row_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Sets the remote row id. An empty id clears it.
    pub fn set_row_id(&mut self, row_id: impl Into<String>) {
        let id = row_id.into();
        self.row_id = if id.trim().is_empty() {
            None
        } else {
            Some(id.trim().to_string())
        };
    }
}
