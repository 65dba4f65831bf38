#![allow(dead_code)]

use tablesync_engine::{KeyIndex, MutationPlan, RowRef, SheetCodec, SheetLayout};
use tablesync_types::{
    BusinessKey, CanonicalRecord, FieldMapping, FieldPair, KeyNormalization, Side, TimestampFields,
};

pub fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| (*c).to_string()).collect()
}

/// ID (key), Name, Qty.
pub fn basic_mapping() -> FieldMapping {
    FieldMapping::new(
        vec![
            FieldPair::new("ID", "c_id"),
            FieldPair::new("Name", "c_name"),
            FieldPair::new("Qty", "c_qty"),
        ],
        "ID",
    )
    .unwrap()
}

/// Basic mapping plus pointer and updated-at/by columns.
pub fn two_way_mapping() -> FieldMapping {
    basic_mapping()
        .with_pointer_field("Row ID")
        .unwrap()
        .with_timestamps(TimestampFields {
            updated_at: FieldPair::new("Updated At", "c_uat"),
            updated_by: FieldPair::new("Updated By", "c_uby"),
        })
        .unwrap()
}

pub fn record(id: &str, fields: &[(&str, &str)]) -> CanonicalRecord {
    let mut rec = CanonicalRecord::new(BusinessKey::normalize(id, KeyNormalization::Trim))
        .with_field("ID", id);
    for (name, value) in fields {
        rec.set(*name, *value);
    }
    rec
}

pub fn index(records: Vec<CanonicalRecord>) -> KeyIndex {
    KeyIndex::build(records)
}

/// A sheet held in memory: header plus positional body rows.
#[derive(Debug, Clone)]
pub struct SheetModel {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetModel {
    pub fn new(header: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            header: strings(header),
            rows,
        }
    }

    pub fn index(&self, mapping: &FieldMapping) -> KeyIndex {
        let codec = SheetCodec::new(mapping, SheetLayout::new(self.header.clone())).unwrap();
        KeyIndex::build(self.rows.iter().map(|row| codec.decode(row)))
    }

    /// Applies the sheet half of a plan the way a sheet writer would:
    /// cell writes, then deletes highest first, then appends.
    pub fn apply(&mut self, mapping: &FieldMapping, plan: &MutationPlan) {
        let codec = SheetCodec::new(mapping, SheetLayout::new(self.header.clone())).unwrap();
        for update in plan.updates_for(Side::Sheet) {
            let RowRef::Position(pos) = update.row else {
                panic!("sheet update without a position");
            };
            let col = codec.column(&update.field).unwrap();
            let row = &mut self.rows[pos];
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col] = update.new.clone();
        }
        for pos in plan.delete_positions(Side::Sheet) {
            self.rows.remove(pos);
        }
        for insert in plan.inserts_for(Side::Sheet) {
            self.rows.push(codec.encode(&insert.record));
        }
    }
}
