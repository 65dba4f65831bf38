//! Property-based tests for reconciliation.
//!
//! - Idempotence: applying a mirror plan and re-running yields an empty plan
//! - The same holds for an upsert into the remote, read back through the codecs
//! - Conflict resolution is symmetric in the two sides
//! - Duplicates never produce inserts or updates for their key

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{basic_mapping, record, strings, SheetModel};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use tablesync_engine::{
    mirror, resolve, KeyIndex, MirrorPolicy, RemoteCodec, Resolution, RowRef, SheetCodec,
    SheetLayout,
};
use tablesync_types::{CanonicalRecord, Side};

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::string::string_regex("K[1-6]").unwrap(),
        1 => Just(String::new()),
    ]
}

fn value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{0,3}").unwrap()
}

fn source_strategy() -> impl Strategy<Value = Vec<CanonicalRecord>> {
    prop::collection::vec((key_strategy(), value_strategy(), value_strategy()), 0..8).prop_map(
        |rows| {
            rows.into_iter()
                .map(|(k, name, qty)| record(&k, &[("Name", &name), ("Qty", &qty)]))
                .collect()
        },
    )
}

fn sheet_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        (key_strategy(), value_strategy(), value_strategy(), value_strategy())
            .prop_map(|(k, name, qty, extra)| vec![k, name, qty, extra]),
        0..8,
    )
}

fn padded_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(" {0,2}[a-z0-9]{0,3} {0,2}").unwrap()
}

fn padded_rows_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        (key_strategy(), padded_value_strategy(), padded_value_strategy())
            .prop_map(|(k, name, qty)| vec![k, name, qty]),
        0..8,
    )
}

/// Writes the remote half of a plan into rows the way the remote client
/// would: updates by row id, then inserts with fresh ids.
fn apply_remote(codec: &RemoteCodec<'_>, rows: &mut Vec<Map<String, Value>>, plan: &tablesync_engine::MutationPlan) {
    for (row, updates) in plan.updates_by_row(Side::Remote) {
        let RowRef::RowId(id) = row else {
            panic!("remote update without a row id");
        };
        let target = rows
            .iter_mut()
            .find(|r| r.get("$rowID") == Some(&json!(id)))
            .unwrap();
        for update in updates {
            let column = codec.remote_column(&update.field).unwrap();
            target.insert(column.to_string(), json!(update.new));
        }
    }
    for insert in plan.inserts_for(Side::Remote) {
        let mut row = codec.encode(&insert.record);
        row.insert("$rowID".to_string(), json!(format!("r-{}", rows.len())));
        rows.push(row);
    }
}

fn timestamp_strategy() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop::option::of((0i64..3).prop_map(|h| Utc.with_ymd_and_hms(2024, 1, 1, h as u32, 0, 0).unwrap()))
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Sheet), Just(Side::Remote)]
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn mirror_twice_is_a_no_op(source in source_strategy(), rows in sheet_strategy()) {
        let mapping = basic_mapping();
        let source = KeyIndex::build(source);
        let mut model = SheetModel::new(&["ID", "Name", "Qty", "Extra"], rows);

        let first = mirror(&source, &model.index(&mapping), Side::Sheet, &mapping, &MirrorPolicy::default());
        model.apply(&mapping, &first);

        let target = model.index(&mapping);
        let second = mirror(&source, &target, Side::Sheet, &mapping, &MirrorPolicy::default());
        prop_assert!(second.is_empty(), "second plan: {:?}", second);

        let fields = mapping.content_fields();
        prop_assert_eq!(source.digest(&fields), target.digest(&fields));
    }

    #[test]
    fn upsert_through_both_codecs_converges(
        sheet_rows in padded_rows_strategy(),
        stale_rows in padded_rows_strategy(),
    ) {
        let mapping = basic_mapping();
        let sheet_codec =
            SheetCodec::new(&mapping, SheetLayout::new(strings(&["ID", "Name", "Qty"]))).unwrap();
        let remote_codec = RemoteCodec::new(&mapping);
        let source = KeyIndex::build(sheet_rows.iter().map(|row| sheet_codec.decode(row)));

        let mut remote_rows: Vec<Map<String, Value>> = stale_rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut obj = Map::new();
                obj.insert("$rowID".to_string(), json!(format!("r-{i}")));
                obj.insert("c_id".to_string(), json!(row[0]));
                obj.insert("c_name".to_string(), json!(row[1]));
                obj.insert("c_qty".to_string(), json!(row[2]));
                obj
            })
            .collect();
        let decode = |rows: &[Map<String, Value>]| {
            KeyIndex::build(rows.iter().map(|row| remote_codec.decode(row)))
        };

        let first = mirror(&source, &decode(remote_rows.as_slice()), Side::Remote, &mapping, &MirrorPolicy::upsert());
        apply_remote(&remote_codec, &mut remote_rows, &first);

        let second = mirror(&source, &decode(remote_rows.as_slice()), Side::Remote, &mapping, &MirrorPolicy::upsert());
        prop_assert!(second.is_empty(), "second plan: {:?}", second);
    }

    #[test]
    fn resolution_is_symmetric(
        a in timestamp_strategy(),
        b in timestamp_strategy(),
        fallback in side_strategy(),
    ) {
        let forward = resolve(a, b, fallback);
        let swapped = resolve(b, a, fallback);
        let expected = match forward {
            Resolution::Winner(side) => Resolution::Winner(side.opposite()),
            other => other,
        };
        prop_assert_eq!(swapped, expected);
    }

    #[test]
    fn duplicates_never_plan_inserts_or_updates(rows in sheet_strategy()) {
        let mapping = basic_mapping();
        let model = SheetModel::new(&["ID", "Name", "Qty", "Extra"], rows.clone());
        let sheet_index = model.index(&mapping);

        // The remote already holds exactly the retained sheet rows.
        let remote_index = KeyIndex::build(
            sheet_index
                .records()
                .map(|r| r.clone().with_row_id(format!("r-{}", r.key())))
                .collect::<Vec<_>>(),
        );

        let plan = mirror(&sheet_index, &remote_index, Side::Remote, &mapping, &MirrorPolicy::default());
        prop_assert!(plan.inserts.is_empty());
        prop_assert!(plan.updates.is_empty());
        prop_assert!(plan.deletes.is_empty());
        prop_assert_eq!(plan.duplicate_deletes.len(), sheet_index.duplicates().len());
        for dup in &plan.duplicate_deletes {
            prop_assert_eq!(dup.side, Side::Sheet);
        }
    }
}
