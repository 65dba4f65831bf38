//! Glide-style remote table client.
//!
//! Reads go through `queryTables` with `startAt`/`next` pagination; writes
//! go through `mutateTables` in chunks.

use crate::error::{SyncError, SyncResult};
use crate::http::JsonClient;
use crate::response::{parse_query_response, QueryPage};
use crate::retry::RetryPolicy;
use crate::store::{RemoteMutation, RemoteRead, RemoteTable};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Remote API configuration shared by every table of one app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlideConfig {
    /// Base URL of the API (e.g. `https://api.glideapp.io`).
    pub api_base_url: String,
    /// Application identifier sent with every call.
    pub app_id: String,
    /// Mutations per `mutateTables` call.
    pub mutation_chunk: usize,
    /// Safety limit on pages followed by one read.
    pub max_pages: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GlideConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.glideapp.io".to_string(),
            app_id: String::new(),
            mutation_chunk: 200,
            max_pages: 1000,
            timeout_secs: 60,
        }
    }
}

/// One remote table.
#[derive(Debug, Clone)]
pub struct GlideTable {
    config: GlideConfig,
    table: String,
    http: JsonClient,
}

impl GlideTable {
    /// Creates a client for `table`, authenticating with a bearer token.
    pub fn new(
        config: GlideConfig,
        table: impl Into<String>,
        token: String,
        retry: RetryPolicy,
    ) -> SyncResult<Self> {
        let table = table.into();
        if config.app_id.trim().is_empty() {
            return Err(SyncError::Configuration("remote app id is empty".into()));
        }
        if table.trim().is_empty() {
            return Err(SyncError::Configuration("remote table name is empty".into()));
        }
        let http = JsonClient::new(token, config.timeout_secs, retry)?;
        Ok(Self {
            config,
            table,
            http,
        })
    }

    fn url(&self, function: &str) -> String {
        format!(
            "{}/api/function/{function}",
            self.config.api_base_url.trim_end_matches('/')
        )
    }

    fn mutation_json(&self, mutation: &RemoteMutation) -> Value {
        match mutation {
            RemoteMutation::Add { values } => json!({
                "kind": "add-row-to-table",
                "tableName": self.table,
                "columnValues": values,
            }),
            RemoteMutation::Update { row_id, values } => json!({
                "kind": "set-columns-in-row",
                "tableName": self.table,
                "rowID": row_id,
                "columnValues": values,
            }),
        }
    }

    async fn mutate(&self, mutations: &[RemoteMutation]) -> SyncResult<Vec<Option<String>>> {
        let body = json!({
            "appID": self.config.app_id,
            "mutations": mutations.iter().map(|m| self.mutation_json(m)).collect::<Vec<_>>(),
        });
        let response = self
            .http
            .send("remote.mutateTables", Method::POST, &self.url("mutateTables"), &[], Some(&body))
            .await?;

        let results = response.as_array().cloned().unwrap_or_default();
        Ok(mutations
            .iter()
            .enumerate()
            .map(|(i, mutation)| match mutation {
                RemoteMutation::Add { .. } => results.get(i).and_then(row_id_of),
                RemoteMutation::Update { .. } => None,
            })
            .collect())
    }
}

fn row_id_of(result: &Value) -> Option<String> {
    ["rowID", "Row ID", "$rowID"]
        .iter()
        .find_map(|k| result.get(*k).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl RemoteTable for GlideTable {
    fn name(&self) -> &str {
        &self.table
    }

    async fn read_all(&self) -> SyncResult<RemoteRead> {
        let mut rows = Vec::new();
        let mut start_at: Option<String> = None;

        for page in 0..self.config.max_pages {
            let mut query = json!({ "tableName": self.table, "utc": true });
            if let Some(token) = &start_at {
                query["startAt"] = Value::String(token.clone());
            }
            let body = json!({ "appID": self.config.app_id, "queries": [query] });
            let response = self
                .http
                .send("remote.queryTables", Method::POST, &self.url("queryTables"), &[], Some(&body))
                .await?;

            match parse_query_response(&response) {
                QueryPage::Rows { rows: page_rows, next } => {
                    debug!(table = %self.table, page, rows = page_rows.len(), "read remote page");
                    rows.extend(page_rows);
                    match next {
                        Some(token) => start_at = Some(token),
                        None => {
                            info!(table = %self.table, rows = rows.len(), "read remote table");
                            return Ok(RemoteRead::Rows(rows));
                        }
                    }
                }
                QueryPage::Unrecognized(detail) => {
                    warn!(table = %self.table, page, %detail, "unrecognized remote response");
                    return Ok(RemoteRead::Unrecognized(detail));
                }
            }
        }

        Err(SyncError::DataShape(format!(
            "remote table {:?} still paginating after {} pages",
            self.table, self.config.max_pages
        )))
    }

    async fn add_record(&self, values: Map<String, Value>) -> SyncResult<Option<String>> {
        let ids = self.mutate(&[RemoteMutation::Add { values }]).await?;
        Ok(ids.into_iter().next().flatten())
    }

    async fn update_record(&self, row_id: &str, values: Map<String, Value>) -> SyncResult<()> {
        self.mutate(&[RemoteMutation::Update {
            row_id: row_id.to_string(),
            values,
        }])
        .await?;
        Ok(())
    }

    async fn apply_batch(&self, mutations: Vec<RemoteMutation>) -> SyncResult<Vec<Option<String>>> {
        let chunk = self.config.mutation_chunk.max(1);
        let mut out = Vec::with_capacity(mutations.len());
        for (i, batch) in mutations.chunks(chunk).enumerate() {
            debug!(table = %self.table, chunk = i, mutations = batch.len(), "submitting mutations");
            out.extend(self.mutate(batch).await?);
        }
        Ok(out)
    }
}
