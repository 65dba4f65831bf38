//! Declared field mapping between the sheet side and the remote side.
//!
//! Canonical field names are the sheet headers. Each [`FieldPair`] associates
//! one of them with a remote column identifier. Exactly one pair is the key
//! field.

use crate::{Error, KeyNormalization, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One declared field: sheet header and remote column identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPair {
    /// Canonical field name (the sheet header).
    pub field: String,
    /// Remote column identifier.
    pub remote: String,
}

impl FieldPair {
    pub fn new(field: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            remote: remote.into(),
        }
    }
}

/// A canonical field computed from two other canonical fields as
/// `"<left> - <right>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedField {
    pub field: String,
    pub left: String,
    pub right: String,
}

impl DerivedField {
    /// Computes the derived value; empty when both inputs are empty.
    #[must_use]
    pub fn compute(&self, left: &str, right: &str) -> String {
        if left.is_empty() && right.is_empty() {
            String::new()
        } else {
            format!("{left} - {right}")
        }
    }
}

/// Value re-rendering applied when decoding remote values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    #[default]
    Verbatim,
    /// Render dates as `MM-DD-YYYY`.
    UsDate,
}

/// "Last updated at / by" columns used by two-way sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampFields {
    pub updated_at: FieldPair,
    pub updated_by: FieldPair,
}

/// Serialized shape of a [`FieldMapping`]; validated on conversion.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldMappingSpec {
    key_field: String,
    #[serde(default)]
    key_normalization: KeyNormalization,
    fields: Vec<FieldPair>,
    #[serde(default)]
    derived: Vec<DerivedField>,
    #[serde(default)]
    formats: BTreeMap<String, FieldFormat>,
    #[serde(default)]
    timestamps: Option<TimestampFields>,
    #[serde(default)]
    pointer_field: Option<String>,
}

/// A validated, ordered field mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FieldMappingSpec", into = "FieldMappingSpec")]
pub struct FieldMapping {
    key_field: String,
    key_normalization: KeyNormalization,
    pairs: Vec<FieldPair>,
    derived: Vec<DerivedField>,
    formats: BTreeMap<String, FieldFormat>,
    timestamps: Option<TimestampFields>,
    pointer_field: Option<String>,
}

impl FieldMapping {
    /// Builds a mapping from ordered pairs and the name of the key field.
    pub fn new(pairs: Vec<FieldPair>, key_field: impl Into<String>) -> Result<Self> {
        let mapping = Self {
            key_field: key_field.into(),
            key_normalization: KeyNormalization::default(),
            pairs,
            derived: Vec::new(),
            formats: BTreeMap::new(),
            timestamps: None,
            pointer_field: None,
        };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Sets how key values are normalized.
    #[must_use]
    pub fn with_key_normalization(mut self, mode: KeyNormalization) -> Self {
        self.key_normalization = mode;
        self
    }

    /// Adds a derived field.
    pub fn with_derived(mut self, derived: DerivedField) -> Result<Self> {
        self.derived.push(derived);
        self.validate()?;
        Ok(self)
    }

    /// Declares a value format for a mapped field.
    pub fn with_format(mut self, field: impl Into<String>, format: FieldFormat) -> Result<Self> {
        self.formats.insert(field.into(), format);
        self.validate()?;
        Ok(self)
    }

    /// Declares the "last updated at / by" columns.
    pub fn with_timestamps(mut self, timestamps: TimestampFields) -> Result<Self> {
        self.timestamps = Some(timestamps);
        self.validate()?;
        Ok(self)
    }

    /// Declares the sheet column holding the remote row id.
    pub fn with_pointer_field(mut self, field: impl Into<String>) -> Result<Self> {
        self.pointer_field = Some(field.into());
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            return Err(Error::InvalidMapping("no fields declared".into()));
        }

        let mut fields = HashSet::new();
        let mut remotes = HashSet::new();
        for pair in &self.pairs {
            if pair.field.trim().is_empty() || pair.remote.trim().is_empty() {
                return Err(Error::InvalidMapping(format!(
                    "empty name in pair {:?} -> {:?}",
                    pair.field, pair.remote
                )));
            }
            if !fields.insert(pair.field.as_str()) {
                return Err(Error::InvalidMapping(format!("duplicate field {:?}", pair.field)));
            }
            if !remotes.insert(pair.remote.as_str()) {
                return Err(Error::InvalidMapping(format!(
                    "duplicate remote column {:?}",
                    pair.remote
                )));
            }
        }

        if !fields.contains(self.key_field.as_str()) {
            return Err(Error::InvalidMapping(format!(
                "key field {:?} is not mapped",
                self.key_field
            )));
        }

        for derived in &self.derived {
            if fields.contains(derived.field.as_str()) {
                return Err(Error::InvalidMapping(format!(
                    "derived field {:?} is also mapped",
                    derived.field
                )));
            }
            for source in [&derived.left, &derived.right] {
                if !fields.contains(source.as_str()) {
                    return Err(Error::InvalidMapping(format!(
                        "derived field {:?} reads unmapped field {:?}",
                        derived.field, source
                    )));
                }
            }
        }

        for field in self.formats.keys() {
            if !fields.contains(field.as_str()) {
                return Err(Error::InvalidMapping(format!("format declared for unmapped field {field:?}")));
            }
        }

        let mut reserved = Vec::new();
        if let Some(ts) = &self.timestamps {
            reserved.push(&ts.updated_at.field);
            reserved.push(&ts.updated_by.field);
        }
        if let Some(pointer) = &self.pointer_field {
            reserved.push(pointer);
        }
        for name in reserved {
            if name.trim().is_empty() {
                return Err(Error::InvalidMapping("empty metadata column name".into()));
            }
            if fields.contains(name.as_str()) {
                return Err(Error::InvalidMapping(format!(
                    "metadata column {name:?} is also a content field"
                )));
            }
        }

        Ok(())
    }

    /// Name of the key field.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// The pair for the key field.
    #[must_use]
    pub fn key_pair(&self) -> &FieldPair {
        self.pairs
            .iter()
            .find(|p| p.field == self.key_field)
            .unwrap_or(&self.pairs[0])
    }

    /// Key normalization mode.
    #[must_use]
    pub fn key_normalization(&self) -> KeyNormalization {
        self.key_normalization
    }

    /// Declared pairs, in declaration order.
    #[must_use]
    pub fn pairs(&self) -> &[FieldPair] {
        &self.pairs
    }

    /// Declared pairs other than the key field.
    pub fn value_pairs(&self) -> impl Iterator<Item = &FieldPair> {
        self.pairs.iter().filter(|p| p.field != self.key_field)
    }

    /// Derived fields.
    #[must_use]
    pub fn derived(&self) -> &[DerivedField] {
        &self.derived
    }

    /// The format declared for a field.
    #[must_use]
    pub fn format_for(&self, field: &str) -> FieldFormat {
        self.formats.get(field).copied().unwrap_or_default()
    }

    /// Two-way timestamp columns, if declared.
    #[must_use]
    pub fn timestamps(&self) -> Option<&TimestampFields> {
        self.timestamps.as_ref()
    }

    /// Sheet column holding the remote row id, if declared.
    #[must_use]
    pub fn pointer_field(&self) -> Option<&str> {
        self.pointer_field.as_deref()
    }

    /// Remote column for a canonical field.
    #[must_use]
    pub fn remote_for(&self, field: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.field == field)
            .map(|p| p.remote.as_str())
    }

    /// Fields whose values define a record's content: mapped fields in
    /// declaration order, then derived fields.
    #[must_use]
    pub fn content_fields(&self) -> Vec<&str> {
        self.pairs
            .iter()
            .map(|p| p.field.as_str())
            .chain(self.derived.iter().map(|d| d.field.as_str()))
            .collect()
    }

    /// Every sheet header this mapping needs: key, pointer, timestamp
    /// columns, mapped fields, derived fields. No duplicates.
    #[must_use]
    pub fn required_headers(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !out.iter().any(|h| h == name) {
                out.push(name.to_string());
            }
        };

        push(&self.key_field);
        if let Some(pointer) = &self.pointer_field {
            push(pointer);
        }
        if let Some(ts) = &self.timestamps {
            push(&ts.updated_at.field);
            push(&ts.updated_by.field);
        }
        for pair in &self.pairs {
            push(&pair.field);
        }
        for derived in &self.derived {
            push(&derived.field);
        }
        out
    }
}

impl TryFrom<FieldMappingSpec> for FieldMapping {
    type Error = Error;

    fn try_from(spec: FieldMappingSpec) -> Result<Self> {
        let mapping = Self {
            key_field: spec.key_field,
            key_normalization: spec.key_normalization,
            pairs: spec.fields,
            derived: spec.derived,
            formats: spec.formats,
            timestamps: spec.timestamps,
            pointer_field: spec.pointer_field,
        };
        mapping.validate()?;
        Ok(mapping)
    }
}

impl From<FieldMapping> for FieldMappingSpec {
    fn from(mapping: FieldMapping) -> Self {
        Self {
            key_field: mapping.key_field,
            key_normalization: mapping.key_normalization,
            fields: mapping.pairs,
            derived: mapping.derived,
            formats: mapping.formats,
            timestamps: mapping.timestamps,
            pointer_field: mapping.pointer_field,
        }
    }
}
