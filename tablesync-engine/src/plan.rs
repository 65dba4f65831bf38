//! The output of reconciliation.
//!
//! Sides follow the reconciler that produced the plan: in a mirror, A is
//! the authoritative source and B the mirrored target; in two-way and
//! append-only modes, A is the sheet and B the remote.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tablesync_types::{BusinessKey, CanonicalRecord, Side};

/// Address of an existing row on one side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowRef {
    /// Zero-based body position on the sheet (the header is row 1, so
    /// position 0 is sheet row 2).
    Position(usize),
    /// Remote row identifier.
    RowId(String),
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(pos) => write!(f, "row {}", pos + 2),
            Self::RowId(id) => write!(f, "id {id}"),
        }
    }
}

/// A record to create on one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insert {
    pub side: Side,
    pub key: BusinessKey,
    pub record: CanonicalRecord,
}

/// A single-cell change on an existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellUpdate {
    pub side: Side,
    pub key: BusinessKey,
    pub row: RowRef,
    pub field: String,
    pub old: String,
    pub new: String,
}

/// A row to remove from one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delete {
    pub side: Side,
    /// Key of the removed row; empty for keyless rows removed by a wipe.
    pub key: BusinessKey,
    pub position: usize,
}

/// How a key present on at least one side was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Only A has the key.
    OnlyA,
    /// Only B has the key.
    OnlyB,
    /// Both have the key and nothing propagates.
    Concordant,
    /// A's values propagate to B.
    AWins,
    /// B's values propagate to A.
    BWins,
    /// Neither timestamp parsed; the configured side's values propagate.
    Fallback(Side),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyOutcome {
    pub key: BusinessKey,
    pub outcome: Outcome,
}

/// Mutation counts reported in run summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub inserted: usize,
    /// Distinct rows touched by cell updates.
    pub updated: usize,
    pub cells: usize,
    pub deleted: usize,
    pub duplicates: usize,
}

/// Everything a reconciliation decided to change. Computed fresh every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationPlan {
    pub inserts: Vec<Insert>,
    pub updates: Vec<CellUpdate>,
    pub deletes: Vec<Delete>,
    pub duplicate_deletes: Vec<Delete>,
    /// Set when the authoritative source was empty and the target is being
    /// cleared entirely.
    pub wipe: bool,
    pub outcomes: Vec<KeyOutcome>,
}

impl MutationPlan {
    /// Returns true if the plan changes nothing on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
            && self.duplicate_deletes.is_empty()
    }

    pub fn inserts_for(&self, side: Side) -> impl Iterator<Item = &Insert> {
        self.inserts.iter().filter(move |i| i.side == side)
    }

    pub fn updates_for(&self, side: Side) -> impl Iterator<Item = &CellUpdate> {
        self.updates.iter().filter(move |u| u.side == side)
    }

    /// Cell updates for one side grouped by row, rows in first-seen order.
    #[must_use]
    pub fn updates_by_row(&self, side: Side) -> Vec<(&RowRef, Vec<&CellUpdate>)> {
        let mut rows: Vec<(&RowRef, Vec<&CellUpdate>)> = Vec::new();
        for update in self.updates_for(side) {
            match rows.iter_mut().find(|(row, _)| *row == &update.row) {
                Some((_, cells)) => cells.push(update),
                None => rows.push((&update.row, vec![update])),
            }
        }
        rows
    }

    /// Positions to delete on one side, highest first, without repeats.
    /// Includes duplicate deletes.
    #[must_use]
    pub fn delete_positions(&self, side: Side) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .deletes
            .iter()
            .chain(&self.duplicate_deletes)
            .filter(|d| d.side == side)
            .map(|d| d.position)
            .collect();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();
        positions
    }

    /// Number of keys per outcome.
    #[must_use]
    pub fn outcome_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.outcomes {
            let name = match entry.outcome {
                Outcome::OnlyA => "only_a".to_string(),
                Outcome::OnlyB => "only_b".to_string(),
                Outcome::Concordant => "concordant".to_string(),
                Outcome::AWins => "a_wins".to_string(),
                Outcome::BWins => "b_wins".to_string(),
                Outcome::Fallback(side) => format!("fallback_{side}"),
            };
            *counts.entry(name).or_insert(0) += 1;
        }
        counts
    }

    #[must_use]
    pub fn counts(&self) -> PlanCounts {
        let mut rows: Vec<(Side, &RowRef)> = self.updates.iter().map(|u| (u.side, &u.row)).collect();
        rows.sort();
        rows.dedup();
        PlanCounts {
            inserted: self.inserts.len(),
            updated: rows.len(),
            cells: self.updates.len(),
            deleted: self.deletes.len(),
            duplicates: self.duplicate_deletes.len(),
        }
    }
}
