use super::{field_diffs, pointer_repair};
use crate::conflict::{resolve_raw, Resolution};
use crate::index::KeyIndex;
use crate::plan::{Delete, Insert, KeyOutcome, MutationPlan, Outcome};
use crate::{EngineError, EngineResult};
use tablesync_types::{FieldMapping, Side};

/// Bidirectional reconciliation with last-write-wins conflict resolution.
///
/// A is the sheet, B is the remote. Keys on one side only are created on
/// the other. Keys on both sides compare their "updated at" values; the
/// winner's differing mapped fields propagate, followed by its "updated
/// at / by" values. The sheet's remote-row pointer is repaired whenever it
/// is stale or missing, whatever the content outcome.
///
/// Fails only when the mapping declares no timestamp columns.
pub fn two_way(
    sheet: &KeyIndex,
    remote: &KeyIndex,
    mapping: &FieldMapping,
    default_winner: Side,
) -> EngineResult<MutationPlan> {
    let ts = mapping.timestamps().ok_or_else(|| {
        EngineError::Configuration("two-way sync requires updated-at/by columns".into())
    })?;

    let fields: Vec<&str> = mapping
        .value_pairs()
        .map(|pair| pair.field.as_str())
        .collect();
    let stamp_fields = [ts.updated_at.field.as_str(), ts.updated_by.field.as_str()];

    let mut plan = MutationPlan {
        duplicate_deletes: sheet
            .duplicates()
            .iter()
            .map(|dup| Delete {
                side: Side::Sheet,
                key: dup.key.clone(),
                position: dup.position,
            })
            .collect(),
        ..MutationPlan::default()
    };

    for sheet_row in sheet.iter() {
        let key = sheet_row.record.key();
        let Some(remote_row) = remote.get(key) else {
            plan.inserts.push(Insert {
                side: Side::Remote,
                key: key.clone(),
                record: sheet_row.record.clone(),
            });
            plan.outcomes.push(KeyOutcome {
                key: key.clone(),
                outcome: Outcome::OnlyA,
            });
            continue;
        };

        let resolution = resolve_raw(
            sheet_row.record.get(&ts.updated_at.field),
            remote_row.record.get(&ts.updated_at.field),
            default_winner,
        );

        let mut diffs = match resolution.winner() {
            Some(Side::Sheet) => field_diffs(&fields, sheet_row, remote_row, Side::Remote, false),
            Some(Side::Remote) => field_diffs(&fields, remote_row, sheet_row, Side::Sheet, false),
            None => Vec::new(),
        };
        if !diffs.is_empty() {
            let stamps = match resolution.winner() {
                Some(Side::Sheet) => {
                    field_diffs(&stamp_fields, sheet_row, remote_row, Side::Remote, false)
                }
                _ => field_diffs(&stamp_fields, remote_row, sheet_row, Side::Sheet, false),
            };
            diffs.extend(stamps);
        }

        let outcome = match (resolution, diffs.is_empty()) {
            (_, true) | (Resolution::Tie, _) => Outcome::Concordant,
            (Resolution::Winner(Side::Sheet), false) => Outcome::AWins,
            (Resolution::Winner(Side::Remote), false) => Outcome::BWins,
            (Resolution::Fallback(side), false) => Outcome::Fallback(side),
        };

        plan.updates.extend(diffs);
        plan.updates.extend(pointer_repair(
            mapping.pointer_field(),
            sheet_row,
            remote_row.record.row_id(),
        ));
        plan.outcomes.push(KeyOutcome {
            key: key.clone(),
            outcome,
        });
    }

    for remote_row in remote.iter() {
        let key = remote_row.record.key();
        if sheet.contains(key) {
            continue;
        }
        plan.inserts.push(Insert {
            side: Side::Sheet,
            key: key.clone(),
            record: remote_row.record.clone(),
        });
        plan.outcomes.push(KeyOutcome {
            key: key.clone(),
            outcome: Outcome::OnlyB,
        });
    }

    Ok(plan)
}
