//! Content digest over a record set.
//!
//! Layout of the hashed blob, joined by `\n`:
//!
//! ```text
//! N=<count>
//! H=<field1>|<field2>|...
//! <key>|<v1>|<v2>|...      one line per record, sorted by key
//! ```
//!
//! The digest only short-circuits work; a mismatch always leads to a full
//! diff.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tablesync_types::{BusinessKey, CanonicalRecord};

/// Digest of a record set with no keyed records.
pub const EMPTY_DIGEST: &str = "EMPTY";

/// A record-set digest: lowercase hex SHA-256, or [`EMPTY_DIGEST`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// The empty-set sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self(EMPTY_DIGEST.to_string())
    }

    /// Wraps a previously persisted digest value.
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns true if this is the empty-set sentinel.
    #[must_use]
    pub fn is_empty_set(&self) -> bool {
        self.0 == EMPTY_DIGEST
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the digest of a record set over the given ordered fields.
///
/// Records with an empty key are ignored. When several records share a
/// key only the first one (in iteration order) contributes. The result
/// does not depend on iteration order otherwise.
pub fn digest<'a, I>(records: I, fields: &[&str]) -> Digest
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    let mut retained: BTreeMap<&BusinessKey, &CanonicalRecord> = BTreeMap::new();
    for record in records {
        if record.key().is_empty() {
            continue;
        }
        retained.entry(record.key()).or_insert(record);
    }

    if retained.is_empty() {
        return Digest::empty();
    }

    let mut lines = Vec::with_capacity(retained.len() + 2);
    lines.push(format!("N={}", retained.len()));
    lines.push(format!("H={}", fields.join("|")));
    for (key, record) in retained {
        let mut line = key.as_str().to_string();
        for field in fields {
            line.push('|');
            line.push_str(record.get(field));
        }
        lines.push(line);
    }

    let hash = Sha256::digest(lines.join("\n").as_bytes());
    Digest(hex::encode(hash))
}
