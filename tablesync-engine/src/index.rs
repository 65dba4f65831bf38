//! Business-key indexing with duplicate detection.

use crate::digest::{digest, Digest};
use std::collections::HashMap;
use tablesync_types::{BusinessKey, CanonicalRecord};
use tracing::debug;

/// A retained record and its zero-based position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRecord {
    pub position: usize,
    pub record: CanonicalRecord,
}

/// A record excluded because an earlier record had the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub key: BusinessKey,
    /// Position of the excluded record.
    pub position: usize,
    /// Position of the retained record with the same key.
    pub first_position: usize,
}

/// One side's records indexed by business key.
///
/// The first record seen for a key is retained; later records with the same
/// key are reported as [`Duplicate`]s and never merged. Records whose key is
/// empty are skipped entirely.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    retained: HashMap<BusinessKey, IndexedRecord>,
    order: Vec<BusinessKey>,
    duplicates: Vec<Duplicate>,
    keys_by_position: Vec<BusinessKey>,
}

impl KeyIndex {
    /// Indexes records by the key they already carry.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = CanonicalRecord>,
    {
        Self::build_with(records, |record| record.key().clone())
    }

    /// Indexes records by an extracted key. The extracted key replaces the
    /// record's own key.
    pub fn build_with<I, F>(records: I, key_of: F) -> Self
    where
        I: IntoIterator<Item = CanonicalRecord>,
        F: Fn(&CanonicalRecord) -> BusinessKey,
    {
        let mut index = Self::default();
        for (position, mut record) in records.into_iter().enumerate() {
            let key = key_of(&record);
            index.keys_by_position.push(key.clone());
            if key.is_empty() {
                continue;
            }

            if let Some(first) = index.retained.get(&key) {
                index.duplicates.push(Duplicate {
                    key,
                    position,
                    first_position: first.position,
                });
                continue;
            }

            record.set_key(key.clone());
            index.order.push(key.clone());
            index.retained.insert(key, IndexedRecord { position, record });
        }

        if !index.duplicates.is_empty() {
            debug!(
                duplicates = index.duplicates.len(),
                retained = index.order.len(),
                "duplicate keys detected"
            );
        }
        index
    }

    /// Returns the retained record for a key.
    #[must_use]
    pub fn get(&self, key: &BusinessKey) -> Option<&IndexedRecord> {
        self.retained.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &BusinessKey) -> bool {
        self.retained.contains_key(key)
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no record was retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of source rows seen, including skipped and duplicate rows.
    #[must_use]
    pub fn source_len(&self) -> usize {
        self.keys_by_position.len()
    }

    /// The key extracted for a source position (empty for skipped rows).
    #[must_use]
    pub fn key_at(&self, position: usize) -> Option<&BusinessKey> {
        self.keys_by_position.get(position)
    }

    /// Retained keys in first-occurrence order.
    pub fn keys(&self) -> impl Iterator<Item = &BusinessKey> {
        self.order.iter()
    }

    /// Retained records in first-occurrence order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedRecord> {
        self.order.iter().filter_map(|key| self.retained.get(key))
    }

    /// The bare records, without positions, in first-occurrence order.
    pub fn records(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.iter().map(|indexed| &indexed.record)
    }

    /// Duplicates in source order.
    #[must_use]
    pub fn duplicates(&self) -> &[Duplicate] {
        &self.duplicates
    }

    /// Digest of the retained records.
    #[must_use]
    pub fn digest(&self, fields: &[&str]) -> Digest {
        digest(self.records(), fields)
    }
}
