//! Google Sheets backed [`SheetStore`].
//!
//! Uses the Sheets API v4 `values` and `batchUpdate` endpoints. Every value
//! is written with `valueInputOption=RAW` so the sheet stores exactly the
//! strings the codec produced.

use crate::error::{SyncError, SyncResult};
use crate::http::JsonClient;
use crate::retry::RetryPolicy;
use crate::store::{CellWrite, SheetStore};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Sheets client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Base URL of the Sheets API (e.g. `https://sheets.googleapis.com`).
    pub api_base_url: String,
    /// Target spreadsheet.
    pub spreadsheet_id: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://sheets.googleapis.com".to_string(),
            spreadsheet_id: String::new(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Converts a 1-based column number to its letter form (`1` → `A`,
/// `27` → `AA`).
#[must_use]
pub fn column_letter(mut n: usize) -> String {
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Quotes a tab name for A1 notation.
fn quoted(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Google Sheets implementation of [`SheetStore`].
#[derive(Debug, Clone)]
pub struct SheetsClient {
    config: SheetsConfig,
    http: JsonClient,
}

impl SheetsClient {
    /// Creates a client authenticating with a bearer access token.
    pub fn new(config: SheetsConfig, access_token: String, retry: RetryPolicy) -> SyncResult<Self> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(SyncError::Configuration("spreadsheet id is empty".into()));
        }
        let http = JsonClient::new(access_token, config.timeout_secs, retry)?;
        Ok(Self { config, http })
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.spreadsheet_id
        )
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/values/{}", self.spreadsheet_url(), urlencoding::encode(range))
    }

    async fn get_values(&self, range: &str) -> SyncResult<Vec<Vec<String>>> {
        let body: ValueRange = self
            .http
            .send_as("sheets.values.get", Method::GET, &self.values_url(range), &[], None)
            .await?;
        Ok(body
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn put_values(&self, range: &str, rows: &[Vec<String>]) -> SyncResult<()> {
        let body = json!({ "range": range, "values": rows });
        self.http
            .send(
                "sheets.values.update",
                Method::PUT,
                &self.values_url(range),
                &[("valueInputOption", "RAW")],
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn batch_update(&self, requests: Vec<Value>) -> SyncResult<()> {
        let body = json!({ "requests": requests });
        self.http
            .send(
                "sheets.batchUpdate",
                Method::POST,
                &format!("{}:batchUpdate", self.spreadsheet_url()),
                &[],
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn tabs(&self) -> SyncResult<Vec<SheetProperties>> {
        let body: Spreadsheet = self
            .http
            .send_as(
                "sheets.get",
                Method::GET,
                &self.spreadsheet_url(),
                &[("fields", "sheets.properties(sheetId,title)")],
                None,
            )
            .await?;
        Ok(body.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn sheet_id(&self, table: &str) -> SyncResult<i64> {
        self.tabs()
            .await?
            .into_iter()
            .find(|p| p.title == table)
            .map(|p| p.sheet_id)
            .ok_or_else(|| SyncError::Configuration(format!("sheet tab {table:?} not found")))
    }
}

#[async_trait]
impl SheetStore for SheetsClient {
    async fn ensure_table(&self, table: &str) -> SyncResult<()> {
        if self.tabs().await?.iter().any(|p| p.title == table) {
            return Ok(());
        }
        info!(table, "creating sheet tab");
        self.batch_update(vec![json!({ "addSheet": { "properties": { "title": table } } })])
            .await
    }

    async fn list_fields(&self, table: &str) -> SyncResult<Vec<String>> {
        let rows = self.get_values(&format!("{}!1:1", quoted(table))).await?;
        Ok(rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|name| name.trim().to_string())
            .collect())
    }

    async fn write_header(&self, table: &str, header: &[String]) -> SyncResult<()> {
        let range = format!(
            "{}!A1:{}1",
            quoted(table),
            column_letter(header.len().max(1))
        );
        debug!(table, columns = header.len(), "writing header");
        self.put_values(&range, &[header.to_vec()]).await
    }

    async fn read_all(&self, table: &str, width: usize) -> SyncResult<Vec<Vec<String>>> {
        let range = format!("{}!A2:{}", quoted(table), column_letter(width.max(1)));
        let rows = self.get_values(&range).await?;
        debug!(table, rows = rows.len(), "read sheet body");
        Ok(rows)
    }

    async fn write_cells(&self, table: &str, cells: &[CellWrite]) -> SyncResult<()> {
        if cells.is_empty() {
            return Ok(());
        }
        let data: Vec<Value> = cells
            .iter()
            .map(|cell| {
                let a1 = format!("{}{}", column_letter(cell.column + 1), cell.position + 2);
                json!({
                    "range": format!("{}!{a1}:{a1}", quoted(table)),
                    "values": [[cell.value]],
                })
            })
            .collect();
        let body = json!({ "valueInputOption": "RAW", "data": data });
        self.http
            .send(
                "sheets.values.batchUpdate",
                Method::POST,
                &format!("{}/values:batchUpdate", self.spreadsheet_url()),
                &[],
                Some(&body),
            )
            .await?;
        debug!(table, cells = cells.len(), "wrote cells");
        Ok(())
    }

    async fn append_rows(&self, table: &str, rows: &[Vec<String>]) -> SyncResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let range = format!("{}!A1", quoted(table));
        let body = json!({ "values": rows });
        self.http
            .send(
                "sheets.values.append",
                Method::POST,
                &format!("{}:append", self.values_url(&range)),
                &[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ],
                Some(&body),
            )
            .await?;
        debug!(table, rows = rows.len(), "appended rows");
        Ok(())
    }

    async fn delete_rows(&self, table: &str, positions: &[usize]) -> SyncResult<()> {
        if positions.is_empty() {
            return Ok(());
        }
        let mut positions = positions.to_vec();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();

        let sheet_id = self.sheet_id(table).await?;
        let requests = positions
            .iter()
            .map(|pos| {
                json!({
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": pos + 1,
                            "endIndex": pos + 2,
                        }
                    }
                })
            })
            .collect();
        self.batch_update(requests).await?;
        debug!(table, rows = positions.len(), "deleted rows");
        Ok(())
    }

    async fn replace_body(&self, table: &str, rows: &[Vec<String>]) -> SyncResult<()> {
        let header_width = self.list_fields(table).await?.len();
        let width = rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(header_width)
            .max(1);
        let clear = format!("{}!A2:{}", quoted(table), column_letter(width));
        self.http
            .send(
                "sheets.values.clear",
                Method::POST,
                &format!("{}:clear", self.values_url(&clear)),
                &[],
                Some(&json!({})),
            )
            .await?;
        if !rows.is_empty() {
            let range = format!("{}!A2", quoted(table));
            self.put_values(&range, rows).await?;
        }
        debug!(table, rows = rows.len(), "replaced body");
        Ok(())
    }
}
