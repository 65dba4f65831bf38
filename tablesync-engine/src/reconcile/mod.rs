//! Diff-merge between two key-indexed record sets.
//!
//! All reconcilers are pure: they read two [`KeyIndex`]es and return a
//! [`MutationPlan`]. Applying the plan is the caller's job.
//!
//! [`KeyIndex`]: crate::KeyIndex
//! [`MutationPlan`]: crate::MutationPlan

mod append;
mod mirror;
mod two_way;

pub use append::append_only;
pub use mirror::{mirror, MirrorPolicy};
pub use two_way::two_way;

use crate::index::IndexedRecord;
use crate::plan::{CellUpdate, RowRef};
use tablesync_types::Side;

/// Address of an indexed record on its side.
fn row_ref(side: Side, indexed: &IndexedRecord) -> RowRef {
    match (side, indexed.record.row_id()) {
        (Side::Remote, Some(id)) => RowRef::RowId(id.to_string()),
        _ => RowRef::Position(indexed.position),
    }
}

/// Cell updates that make `target` match `source` on `fields`.
fn field_diffs(
    fields: &[&str],
    source: &IndexedRecord,
    target: &IndexedRecord,
    target_side: Side,
    skip_empty_overwrite: bool,
) -> Vec<CellUpdate> {
    let row = row_ref(target_side, target);
    fields
        .iter()
        .filter_map(|field| {
            let new = source.record.get(field);
            let old = target.record.get(field);
            if new == old || (skip_empty_overwrite && new.is_empty()) {
                return None;
            }
            Some(CellUpdate {
                side: target_side,
                key: source.record.key().clone(),
                row: row.clone(),
                field: (*field).to_string(),
                old: old.to_string(),
                new: new.to_string(),
            })
        })
        .collect()
}

/// A sheet pointer update when the sheet row does not hold the remote row id.
fn pointer_repair(
    pointer_field: Option<&str>,
    sheet: &IndexedRecord,
    remote_row_id: Option<&str>,
) -> Option<CellUpdate> {
    let field = pointer_field?;
    let id = remote_row_id?;
    if sheet.record.row_id() == Some(id) {
        return None;
    }
    Some(CellUpdate {
        side: Side::Sheet,
        key: sheet.record.key().clone(),
        row: RowRef::Position(sheet.position),
        field: field.to_string(),
        old: sheet.record.get(field).to_string(),
        new: id.to_string(),
    })
}
