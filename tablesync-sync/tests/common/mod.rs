#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tablesync_sync::{
    CellWrite, Delivery, EventNotifier, RemoteMutation, RemoteRead, RemoteTable, SheetStore,
    SyncError, SyncResult,
};
use tablesync_types::{FieldMapping, FieldPair, TimestampFields};

pub fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| (*c).to_string()).collect()
}

/// ID (key), Name, Status.
pub fn mirror_mapping() -> FieldMapping {
    FieldMapping::new(
        vec![
            FieldPair::new("ID", "c_id"),
            FieldPair::new("Name", "c_name"),
            FieldPair::new("Status", "c_status"),
        ],
        "ID",
    )
    .unwrap()
}

/// ID (key), Name, plus pointer and updated-at/by columns.
pub fn two_way_mapping() -> FieldMapping {
    FieldMapping::new(
        vec![FieldPair::new("ID", "c_id"), FieldPair::new("Name", "c_name")],
        "ID",
    )
    .unwrap()
    .with_pointer_field("Row ID")
    .unwrap()
    .with_timestamps(TimestampFields {
        updated_at: FieldPair::new("Updated At", "c_uat"),
        updated_by: FieldPair::new("Updated By", "c_uby"),
    })
    .unwrap()
}

pub fn remote_row(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), json!(v)))
        .collect()
}

// ── Sheet ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tab {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A spreadsheet held in memory. Records every mutating call.
#[derive(Debug, Default)]
pub struct FakeSheet {
    tabs: Mutex<BTreeMap<String, Tab>>,
    calls: Mutex<Vec<String>>,
    fail_appends: AtomicBool,
}

impl FakeSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tab(self, name: &str, header: &[&str], rows: &[&[&str]]) -> Self {
        self.tabs.lock().unwrap().insert(
            name.to_string(),
            Tab {
                header: strings(header),
                rows: rows.iter().map(|r| strings(r)).collect(),
            },
        );
        self
    }

    pub fn tab(&self, name: &str) -> Option<Tab> {
        self.tabs.lock().unwrap().get(name).cloned()
    }

    pub fn rows(&self, name: &str) -> Vec<Vec<String>> {
        self.tab(name).map(|t| t.rows).unwrap_or_default()
    }

    pub fn set_cell(&self, name: &str, position: usize, column: usize, value: &str) {
        let mut tabs = self.tabs.lock().unwrap();
        let row = &mut tabs.get_mut(name).unwrap().rows[position];
        if row.len() <= column {
            row.resize(column + 1, String::new());
        }
        row[column] = value.to_string();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_appends(&self) {
        self.fail_appends.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn with_existing<T>(&self, name: &str, f: impl FnOnce(&mut Tab) -> T) -> SyncResult<T> {
        let mut tabs = self.tabs.lock().unwrap();
        let tab = tabs
            .get_mut(name)
            .ok_or_else(|| SyncError::Configuration(format!("no tab {name}")))?;
        Ok(f(tab))
    }
}

#[async_trait]
impl SheetStore for FakeSheet {
    async fn ensure_table(&self, table: &str) -> SyncResult<()> {
        let created = {
            let mut tabs = self.tabs.lock().unwrap();
            if tabs.contains_key(table) {
                false
            } else {
                tabs.insert(table.to_string(), Tab::default());
                true
            }
        };
        if created {
            self.record(format!("create_tab {table}"));
        }
        Ok(())
    }

    async fn list_fields(&self, table: &str) -> SyncResult<Vec<String>> {
        self.with_existing(table, |tab| tab.header.clone())
    }

    async fn write_header(&self, table: &str, header: &[String]) -> SyncResult<()> {
        self.with_existing(table, |tab| tab.header = header.to_vec())?;
        self.record(format!("write_header {table}"));
        Ok(())
    }

    async fn read_all(&self, table: &str, width: usize) -> SyncResult<Vec<Vec<String>>> {
        self.with_existing(table, |tab| {
            tab.rows
                .iter()
                .map(|row| row.iter().take(width).cloned().collect())
                .collect()
        })
    }

    async fn write_cells(&self, table: &str, cells: &[CellWrite]) -> SyncResult<()> {
        if cells.is_empty() {
            return Ok(());
        }
        self.with_existing(table, |tab| {
            for cell in cells {
                let row = &mut tab.rows[cell.position];
                if row.len() <= cell.column {
                    row.resize(cell.column + 1, String::new());
                }
                row[cell.column] = cell.value.clone();
            }
        })?;
        self.record(format!("write_cells {table} {}", cells.len()));
        Ok(())
    }

    async fn append_rows(&self, table: &str, rows: &[Vec<String>]) -> SyncResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(SyncError::Http {
                status: 400,
                body: "append rejected".into(),
            });
        }
        self.with_existing(table, |tab| tab.rows.extend_from_slice(rows))?;
        self.record(format!("append_rows {table} {}", rows.len()));
        Ok(())
    }

    async fn delete_rows(&self, table: &str, positions: &[usize]) -> SyncResult<()> {
        if positions.is_empty() {
            return Ok(());
        }
        let mut sorted = positions.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        self.with_existing(table, |tab| {
            for pos in &sorted {
                tab.rows.remove(*pos);
            }
        })?;
        self.record(format!("delete_rows {table} {sorted:?}"));
        Ok(())
    }

    async fn replace_body(&self, table: &str, rows: &[Vec<String>]) -> SyncResult<()> {
        self.with_existing(table, |tab| tab.rows = rows.to_vec())?;
        self.record(format!("replace_body {table} {}", rows.len()));
        Ok(())
    }
}

// ── Remote ──────────────────────────────────────────────────────

/// A remote table held in memory. New rows get ids `row-1`, `row-2`, ...
#[derive(Debug, Default)]
pub struct FakeRemote {
    rows: Mutex<Vec<Map<String, Value>>>,
    mutations: Mutex<Vec<RemoteMutation>>,
    next_id: AtomicUsize,
    unrecognized: AtomicBool,
}

impl FakeRemote {
    pub fn new(rows: Vec<Map<String, Value>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<Map<String, Value>> {
        self.rows.lock().unwrap().clone()
    }

    pub fn set_rows(&self, rows: Vec<Map<String, Value>>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn mutations(&self) -> Vec<RemoteMutation> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn answer_unrecognized(&self) {
        self.unrecognized.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteTable for FakeRemote {
    fn name(&self) -> &str {
        "fake"
    }

    async fn read_all(&self) -> SyncResult<RemoteRead> {
        if self.unrecognized.load(Ordering::SeqCst) {
            return Ok(RemoteRead::Unrecognized("object with keys [error]".into()));
        }
        Ok(RemoteRead::Rows(self.rows()))
    }

    async fn add_record(&self, values: Map<String, Value>) -> SyncResult<Option<String>> {
        let id = format!("row-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.mutations
            .lock()
            .unwrap()
            .push(RemoteMutation::Add { values: values.clone() });
        let mut row = values;
        row.insert("$rowID".into(), json!(id));
        self.rows.lock().unwrap().push(row);
        Ok(Some(id))
    }

    async fn update_record(&self, row_id: &str, values: Map<String, Value>) -> SyncResult<()> {
        self.mutations.lock().unwrap().push(RemoteMutation::Update {
            row_id: row_id.to_string(),
            values: values.clone(),
        });
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.get("$rowID").and_then(Value::as_str) == Some(row_id))
            .ok_or_else(|| SyncError::Http {
                status: 404,
                body: format!("no row {row_id}"),
            })?;
        row.extend(values);
        Ok(())
    }
}

// ── Notifier ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FakeNotifier {
    events: Mutex<Vec<(String, Value)>>,
    fail: AtomicBool,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventNotifier for FakeNotifier {
    async fn emit(&self, kind: &str, payload: Value) -> SyncResult<Delivery> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::Notification(format!("{kind}: endpoint down")));
        }
        self.events.lock().unwrap().push((kind.to_string(), payload));
        Ok(Delivery::Delivered { status: 200 })
    }
}
