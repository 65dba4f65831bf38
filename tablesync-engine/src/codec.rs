//! Row codecs: native rows to canonical records and back.
//!
//! The sheet side stores positional rows under a header row; the remote
//! side returns one JSON object per row keyed by column identifier. Both
//! are decoded into [`CanonicalRecord`]s keyed by the mapping's canonical
//! field names.

use crate::{EngineError, EngineResult};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tablesync_types::{
    format_us_date, BusinessKey, CanonicalRecord, FieldFormat, FieldMapping,
};

/// Remote row id columns, in lookup order.
const REMOTE_ROW_ID_COLUMNS: &[&str] = &["$rowID", "rowID"];

/// Merges required headers into an existing header row.
///
/// Existing headers keep their order and are never removed; required
/// headers that are missing are appended in the order given.
#[must_use]
pub fn union_headers(existing: &[String], required: &[String]) -> Vec<String> {
    let mut out = existing.to_vec();
    for name in required {
        if !out.iter().any(|h| h.trim() == name.trim()) {
            out.push(name.clone());
        }
    }
    out
}

/// A sheet header row with a name-to-column lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    header: Vec<String>,
    positions: HashMap<String, usize>,
}

impl SheetLayout {
    /// Builds a layout from a header row. When a name appears twice the
    /// leftmost column is used.
    #[must_use]
    pub fn new(header: Vec<String>) -> Self {
        let mut positions = HashMap::new();
        for (i, name) in header.iter().enumerate() {
            let name = name.trim();
            if !name.is_empty() {
                positions.entry(name.to_string()).or_insert(i);
            }
        }
        Self { header, positions }
    }

    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// Zero-based column of a header name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name.trim()).copied()
    }

    /// Required names with no column in this layout.
    #[must_use]
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| self.position(name).is_none())
            .map(String::as_str)
            .collect()
    }
}

/// Codec for the sheet side.
///
/// Tracks every column the mapping needs (key, pointer, timestamps, mapped
/// and derived fields). Columns outside that set are never read into a
/// record and never written by [`SheetCodec::overlay`].
#[derive(Debug, Clone)]
pub struct SheetCodec<'m> {
    mapping: &'m FieldMapping,
    layout: SheetLayout,
    tracked: Vec<(String, usize)>,
}

impl<'m> SheetCodec<'m> {
    /// Binds a mapping to a header row. Every required header must already
    /// be present; callers union the header first.
    pub fn new(mapping: &'m FieldMapping, layout: SheetLayout) -> EngineResult<Self> {
        let required = mapping.required_headers();
        let missing = layout.missing(&required);
        if !missing.is_empty() {
            return Err(EngineError::Configuration(format!(
                "sheet header is missing columns: {}",
                missing.join(", ")
            )));
        }

        let tracked = required
            .into_iter()
            .filter_map(|name| layout.position(&name).map(|pos| (name, pos)))
            .collect();

        Ok(Self {
            mapping,
            layout,
            tracked,
        })
    }

    #[must_use]
    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    /// Zero-based column of a tracked field.
    #[must_use]
    pub fn column(&self, field: &str) -> Option<usize> {
        self.tracked
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, pos)| *pos)
    }

    /// Decodes one body row. Short rows read as if padded with empty cells.
    ///
    /// Tracked values are trimmed, matching [`normalize_remote_value`], so a
    /// value compares equal to itself after a trip through the remote.
    #[must_use]
    pub fn decode(&self, row: &[String]) -> CanonicalRecord {
        let cell = |pos: usize| row.get(pos).map_or("", |c| c.trim());

        let mut record = CanonicalRecord::default();
        for (field, pos) in &self.tracked {
            record.set(field.clone(), cell(*pos));
        }

        let key = BusinessKey::normalize(
            record.get(self.mapping.key_field()),
            self.mapping.key_normalization(),
        );
        record.set_key(key);

        if let Some(pointer) = self.mapping.pointer_field() {
            let row_id = record.get(pointer).to_string();
            record.set_row_id(row_id);
        }
        record
    }

    /// Encodes a record as a fresh row of exactly the layout width.
    #[must_use]
    pub fn encode(&self, record: &CanonicalRecord) -> Vec<String> {
        self.overlay(record, &[])
    }

    /// Writes a record's tracked fields over an existing row. Every other
    /// cell, including cells past the layout width, is kept as-is.
    #[must_use]
    pub fn overlay(&self, record: &CanonicalRecord, existing: &[String]) -> Vec<String> {
        let mut out = existing.to_vec();
        if out.len() < self.layout.width() {
            out.resize(self.layout.width(), String::new());
        }

        let pointer = self.mapping.pointer_field();
        for (field, pos) in &self.tracked {
            let value = if Some(field.as_str()) == pointer {
                record.row_id().unwrap_or_default()
            } else {
                record.get(field)
            };
            out[*pos] = value.to_string();
        }
        out
    }
}

/// Normalizes a remote JSON value to its canonical string form.
///
/// `null` and missing values are empty; strings are trimmed; arrays are
/// joined with `,`; objects are rendered as compact JSON.
#[must_use]
pub fn normalize_remote_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| normalize_remote_value(Some(item)))
            .collect::<Vec<_>>()
            .join(","),
        Some(other) => other.to_string(),
    }
}

/// Codec for the remote side.
#[derive(Debug, Clone, Copy)]
pub struct RemoteCodec<'m> {
    mapping: &'m FieldMapping,
}

impl<'m> RemoteCodec<'m> {
    #[must_use]
    pub fn new(mapping: &'m FieldMapping) -> Self {
        Self { mapping }
    }

    /// Decodes one remote row object.
    #[must_use]
    pub fn decode(&self, row: &Map<String, Value>) -> CanonicalRecord {
        let mut record = CanonicalRecord::default();

        for pair in self.mapping.pairs() {
            let raw = normalize_remote_value(row.get(&pair.remote));
            let value = match self.mapping.format_for(&pair.field) {
                FieldFormat::Verbatim => raw,
                FieldFormat::UsDate => format_us_date(&raw),
            };
            record.set(pair.field.clone(), value);
        }

        if let Some(ts) = self.mapping.timestamps() {
            for pair in [&ts.updated_at, &ts.updated_by] {
                record.set(pair.field.clone(), normalize_remote_value(row.get(&pair.remote)));
            }
        }

        for derived in self.mapping.derived() {
            let value = derived.compute(record.get(&derived.left), record.get(&derived.right));
            record.set(derived.field.clone(), value);
        }

        let key = BusinessKey::normalize(
            record.get(self.mapping.key_field()),
            self.mapping.key_normalization(),
        );
        record.set_key(key);

        let row_id = REMOTE_ROW_ID_COLUMNS
            .iter()
            .map(|col| normalize_remote_value(row.get(*col)))
            .find(|id| !id.is_empty());
        if let Some(row_id) = row_id {
            record.set_row_id(row_id);
        }
        record
    }

    /// Remote column identifier for a canonical field, including the
    /// timestamp columns.
    #[must_use]
    pub fn remote_column(&self, field: &str) -> Option<&'m str> {
        if let Some(remote) = self.mapping.remote_for(field) {
            return Some(remote);
        }
        let ts = self.mapping.timestamps()?;
        [&ts.updated_at, &ts.updated_by]
            .into_iter()
            .find(|pair| pair.field == field)
            .map(|pair| pair.remote.as_str())
    }

    /// Encodes the given fields of a record as a remote column-value map.
    /// Fields without a remote column (derived fields) are skipped.
    #[must_use]
    pub fn encode_fields(&self, record: &CanonicalRecord, fields: &[&str]) -> Map<String, Value> {
        fields
            .iter()
            .filter_map(|field| {
                self.remote_column(field)
                    .map(|col| (col.to_string(), Value::String(record.get(field).to_string())))
            })
            .collect()
    }

    /// Encodes every mapped and timestamp field of a record.
    #[must_use]
    pub fn encode(&self, record: &CanonicalRecord) -> Map<String, Value> {
        let mut fields: Vec<&str> = self.mapping.pairs().iter().map(|p| p.field.as_str()).collect();
        if let Some(ts) = self.mapping.timestamps() {
            fields.push(&ts.updated_at.field);
            fields.push(&ts.updated_by.field);
        }
        self.encode_fields(record, &fields)
    }
}
