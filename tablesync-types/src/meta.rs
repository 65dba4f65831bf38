//! Typed keys and an in-memory view over the persisted metadata table.
//!
//! The persisted layout is a flat string→string table:
//! - `hash:<scope>` → last committed digest for a sync scope
//! - `<triggerKind>:<domainId>` → timestamp of the first emission

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Prefix reserved for digest entries.
pub const DIGEST_PREFIX: &str = "hash";

/// A typed metadata key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetaKey {
    /// Last committed digest for a scope.
    Digest { scope: String },
    /// One-time trigger flag.
    Trigger { kind: String, domain_id: String },
}

impl MetaKey {
    /// Key for the digest of a scope.
    pub fn digest(scope: impl Into<String>) -> Self {
        Self::Digest {
            scope: scope.into(),
        }
    }

    /// Key for a trigger flag. The kind must be non-empty, must not contain
    /// `:` and must not collide with the digest prefix.
    pub fn trigger(kind: impl Into<String>, domain_id: impl Into<String>) -> Result<Self> {
        let kind = kind.into();
        let domain_id = domain_id.into();
        if kind.is_empty() || kind.contains(':') || kind == DIGEST_PREFIX {
            return Err(Error::InvalidMetaKey(format!("bad trigger kind {kind:?}")));
        }
        if domain_id.trim().is_empty() {
            return Err(Error::InvalidMetaKey("empty trigger domain id".into()));
        }
        Ok(Self::Trigger { kind, domain_id })
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest { scope } => write!(f, "{DIGEST_PREFIX}:{scope}"),
            Self::Trigger { kind, domain_id } => write!(f, "{kind}:{domain_id}"),
        }
    }
}

impl FromStr for MetaKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (prefix, rest) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidMetaKey(s.to_string()))?;
        if prefix == DIGEST_PREFIX {
            return Ok(Self::digest(rest));
        }
        Self::trigger(prefix, rest)
    }
}

/// Metadata loaded once at the start of a run and committed once at the end.
///
/// Tracks which entries changed so the committing store can tell whether a
/// write is needed at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaMap {
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl MetaMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a clean map from raw persisted entries. Rows with an empty key
    /// are dropped.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self {
            entries,
            dirty: false,
        }
    }

    /// Returns the value stored under a key.
    #[must_use]
    pub fn get(&self, key: &MetaKey) -> Option<&str> {
        self.entries.get(&key.to_string()).map(String::as_str)
    }

    /// Stores a value under a key.
    pub fn set(&mut self, key: &MetaKey, value: impl Into<String>) {
        let value = value.into();
        let raw = key.to_string();
        if self.entries.get(&raw) != Some(&value) {
            self.entries.insert(raw, value);
            self.dirty = true;
        }
    }

    /// Returns true if an entry exists and is non-empty.
    #[must_use]
    pub fn is_set(&self, key: &MetaKey) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Returns true if any entry changed since loading.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the map as persisted.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Iterates over raw entries in key order, including entries that do not
    /// parse as a [`MetaKey`] (other tooling may share the table).
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
