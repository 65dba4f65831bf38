use super::{field_diffs, pointer_repair};
use crate::index::KeyIndex;
use crate::plan::{Delete, Insert, KeyOutcome, MutationPlan, Outcome};
use serde::{Deserialize, Serialize};
use tablesync_types::{FieldMapping, Side};
use tracing::debug;

/// Knobs for a one-directional mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorPolicy {
    /// Delete target rows whose key is absent from the source, and wipe the
    /// target when the source is empty.
    pub delete_missing: bool,
    /// Delete later rows that repeat an earlier key on the sheet side.
    pub delete_duplicates: bool,
    /// Never replace a non-empty target value with an empty source value.
    pub skip_empty_overwrite: bool,
}

impl Default for MirrorPolicy {
    fn default() -> Self {
        Self {
            delete_missing: true,
            delete_duplicates: true,
            skip_empty_overwrite: false,
        }
    }
}

impl MirrorPolicy {
    /// Insert-or-update without any deletes.
    #[must_use]
    pub fn upsert() -> Self {
        Self {
            delete_missing: false,
            delete_duplicates: false,
            skip_empty_overwrite: true,
        }
    }
}

/// Makes `target` mirror `source` (A authoritative, B mirrors A).
///
/// Only mapped fields are compared, in declared order; the key field is
/// never rewritten. When the target is the sheet, derived fields and the
/// remote row pointer are mirrored as well. An empty source wipes every
/// target row when deletes are enabled.
#[must_use]
pub fn mirror(
    source: &KeyIndex,
    target: &KeyIndex,
    target_side: Side,
    mapping: &FieldMapping,
    policy: &MirrorPolicy,
) -> MutationPlan {
    let mut plan = MutationPlan::default();

    if source.is_empty() {
        if policy.delete_missing && target.source_len() > 0 {
            debug!(rows = target.source_len(), side = %target_side, "source empty, wiping target");
            plan.wipe = true;
            plan.deletes = (0..target.source_len())
                .map(|position| Delete {
                    side: target_side,
                    key: target.key_at(position).cloned().unwrap_or_default(),
                    position,
                })
                .collect();
        }
        plan.outcomes = target
            .keys()
            .map(|key| KeyOutcome {
                key: key.clone(),
                outcome: Outcome::OnlyB,
            })
            .collect();
        return plan;
    }

    if policy.delete_duplicates {
        for (side, index) in [(target_side, target), (target_side.opposite(), source)] {
            if side != Side::Sheet {
                continue;
            }
            plan.duplicate_deletes.extend(index.duplicates().iter().map(|dup| Delete {
                side,
                key: dup.key.clone(),
                position: dup.position,
            }));
        }
    }

    let key_field = mapping.key_field();
    let fields: Vec<&str> = match target_side {
        Side::Remote => mapping
            .value_pairs()
            .map(|pair| pair.field.as_str())
            .collect(),
        Side::Sheet => mapping
            .content_fields()
            .into_iter()
            .filter(|field| *field != key_field)
            .collect(),
    };
    let pointer_field = match target_side {
        Side::Sheet => mapping.pointer_field(),
        Side::Remote => None,
    };

    for source_row in source.iter() {
        let key = source_row.record.key();
        let Some(target_row) = target.get(key) else {
            plan.inserts.push(Insert {
                side: target_side,
                key: key.clone(),
                record: source_row.record.clone(),
            });
            plan.outcomes.push(KeyOutcome {
                key: key.clone(),
                outcome: Outcome::OnlyA,
            });
            continue;
        };

        let diffs = field_diffs(
            &fields,
            source_row,
            target_row,
            target_side,
            policy.skip_empty_overwrite,
        );
        let outcome = if diffs.is_empty() {
            Outcome::Concordant
        } else {
            Outcome::AWins
        };
        plan.updates.extend(diffs);
        plan.updates
            .extend(pointer_repair(pointer_field, target_row, source_row.record.row_id()));
        plan.outcomes.push(KeyOutcome {
            key: key.clone(),
            outcome,
        });
    }

    for target_row in target.iter() {
        let key = target_row.record.key();
        if source.contains(key) {
            continue;
        }
        if policy.delete_missing {
            plan.deletes.push(Delete {
                side: target_side,
                key: key.clone(),
                position: target_row.position,
            });
        }
        plan.outcomes.push(KeyOutcome {
            key: key.clone(),
            outcome: Outcome::OnlyB,
        });
    }

    plan
}
