//! At-most-once domain events over persisted one-time flags.
//!
//! A flag is keyed `<kind>:<domain_id>` in the run's [`MetaMap`]. The gate
//! only records flags in memory; the caller commits the map together with
//! the new digest, after the backing-store writes and before emitting.

use crate::index::KeyIndex;
use crate::plan::MutationPlan;
use crate::EngineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tablesync_types::{BusinessKey, CanonicalRecord, MetaKey, MetaMap, Side};
use tracing::debug;

/// Format of the first-fire timestamp stored as the flag value.
const FLAG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which mutations on the watched side qualify for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerRule {
    /// An insert or update leaves `field` equal to `value` (trimmed,
    /// case-insensitive). The domain id is read from `id_field`.
    FieldBecomes {
        field: String,
        value: String,
        id_field: String,
    },
    /// A row is inserted. The domain id is the remote row id, or the
    /// business key when there is none.
    Inserted,
}

/// A declared event: its kind, the side it watches and the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub kind: String,
    #[serde(default = "default_side")]
    pub side: Side,
    pub rule: TriggerRule,
}

fn default_side() -> Side {
    Side::Sheet
}

/// A mutation that qualifies under a rule, before gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCandidate {
    pub domain_id: String,
    pub key: BusinessKey,
    pub fields: BTreeMap<String, String>,
}

/// An event cleared for emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Emission {
    pub kind: String,
    pub domain_id: String,
    pub key: BusinessKey,
    pub fields: BTreeMap<String, String>,
}

fn matches_value(actual: &str, expected: &str) -> bool {
    actual.trim().eq_ignore_ascii_case(expected.trim())
}

fn candidate(domain_id: &str, record: &CanonicalRecord) -> TriggerCandidate {
    TriggerCandidate {
        domain_id: domain_id.trim().to_string(),
        key: record.key().clone(),
        fields: record
            .fields()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

impl TriggerSpec {
    /// Mutations in `plan` that qualify under this trigger.
    ///
    /// `written` holds the records whose values are being written to the
    /// watched side (the mirror source, or the opposite side in
    /// bidirectional modes); updated rows are looked up there by key.
    #[must_use]
    pub fn candidates(&self, plan: &MutationPlan, written: &KeyIndex) -> Vec<TriggerCandidate> {
        let mut out = Vec::new();
        match &self.rule {
            TriggerRule::FieldBecomes {
                field,
                value,
                id_field,
            } => {
                for insert in plan.inserts_for(self.side) {
                    if matches_value(insert.record.get(field), value) {
                        out.push(candidate(insert.record.get(id_field), &insert.record));
                    }
                }
                for update in plan.updates_for(self.side) {
                    if update.field != *field || !matches_value(&update.new, value) {
                        continue;
                    }
                    if let Some(row) = written.get(&update.key) {
                        out.push(candidate(row.record.get(id_field), &row.record));
                    }
                }
            }
            TriggerRule::Inserted => {
                for insert in plan.inserts_for(self.side) {
                    let id = insert
                        .record
                        .row_id()
                        .unwrap_or_else(|| insert.key.as_str());
                    out.push(candidate(id, &insert.record));
                }
            }
        }
        out
    }
}

/// Decides which candidates fire, recording a flag for each one that does.
#[derive(Debug)]
pub struct TriggerGate<'m> {
    meta: &'m mut MetaMap,
    fired_at: String,
    fired: Vec<MetaKey>,
}

impl<'m> TriggerGate<'m> {
    /// Creates a gate over the run's loaded metadata. `now` is stored as the
    /// first-fire time of every new flag.
    pub fn new(meta: &'m mut MetaMap, now: DateTime<Utc>) -> Self {
        Self {
            meta,
            fired_at: now.format(FLAG_TIME_FORMAT).to_string(),
            fired: Vec::new(),
        }
    }

    /// Returns true the first time a `(kind, domain_id)` pair is observed
    /// and records its flag; false if the flag is already set.
    pub fn should_fire(&mut self, kind: &str, domain_id: &str) -> EngineResult<bool> {
        let key = MetaKey::trigger(kind, domain_id)?;
        if self.meta.is_set(&key) {
            debug!(flag = %key, "trigger already fired");
            return Ok(false);
        }
        self.meta.set(&key, self.fired_at.clone());
        self.fired.push(key);
        Ok(true)
    }

    /// Gates candidates for one event kind. Candidates without a domain id
    /// are dropped; the rest are deduplicated and returned sorted by
    /// domain id.
    pub fn admit(
        &mut self,
        kind: &str,
        mut candidates: Vec<TriggerCandidate>,
    ) -> EngineResult<Vec<Emission>> {
        candidates.retain(|c| !c.domain_id.is_empty());
        candidates.sort_by(|a, b| a.domain_id.cmp(&b.domain_id));
        candidates.dedup_by(|a, b| a.domain_id == b.domain_id);

        let mut emissions = Vec::new();
        for c in candidates {
            if self.should_fire(kind, &c.domain_id)? {
                emissions.push(Emission {
                    kind: kind.to_string(),
                    domain_id: c.domain_id,
                    key: c.key,
                    fields: c.fields,
                });
            }
        }
        Ok(emissions)
    }

    /// Flags recorded by this gate.
    #[must_use]
    pub fn fired(&self) -> &[MetaKey] {
        &self.fired
    }
}
