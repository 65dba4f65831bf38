//! Shared JSON-over-HTTP plumbing for the backend clients.

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Bearer-authenticated JSON client with retry.
#[derive(Debug, Clone)]
pub(crate) struct JsonClient {
    client: Client,
    token: String,
    retry: RetryPolicy,
}

impl JsonClient {
    pub(crate) fn new(token: String, timeout_secs: u64, retry: RetryPolicy) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token,
            retry,
        })
    }

    /// Sends a request and returns the JSON body (`Null` for an empty body).
    pub(crate) async fn send(
        &self,
        what: &str,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> SyncResult<Value> {
        self.retry
            .run(what, || {
                let method = method.clone();
                async move {
                    debug!(what, %url, "request");
                    let mut request = self
                        .client
                        .request(method, url)
                        .bearer_auth(&self.token)
                        .query(query);
                    if let Some(body) = body {
                        request = request.json(body);
                    }
                    let response = check_status(request.send().await?).await?;
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    serde_json::from_str(&text)
                        .map_err(|e| SyncError::DataShape(format!("{what}: invalid JSON: {e}")))
                }
            })
            .await
    }

    /// Like [`JsonClient::send`], decoding the body into `T`.
    pub(crate) async fn send_as<T: DeserializeOwned>(
        &self,
        what: &str,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> SyncResult<T> {
        let value = self.send(what, method, url, query, body).await?;
        serde_json::from_value(value).map_err(|e| SyncError::DataShape(format!("{what}: {e}")))
    }
}

/// Turns a non-success response into [`SyncError::Http`].
pub(crate) async fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Http {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}
