//! Webhook-backed [`EventNotifier`].

use crate::error::{SyncError, SyncResult};
use crate::http::check_status;
use crate::store::{Delivery, EventNotifier};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-sheets-secret";

/// Webhook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Endpoint; events are not sent when unset.
    pub url: Option<String>,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    pub retries: u32,
    /// Sleep before retry `n` is `n * backoff_ms`.
    pub backoff_ms: u64,
    /// Fail the run when an event cannot be delivered.
    pub strict: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 8,
            retries: 2,
            backoff_ms: 400,
            strict: false,
        }
    }
}

/// Posts events as JSON to a single endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    config: WebhookConfig,
    secret: Option<String>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig, secret: Option<String>) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            secret: secret.filter(|s| !s.is_empty()),
            client,
        })
    }

    /// Returns true when an endpoint is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.endpoint().is_some()
    }

    fn endpoint(&self) -> Option<&str> {
        self.config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    async fn post(&self, url: &str, body: &Value) -> SyncResult<u16> {
        let mut request = self.client.post(url).json(body);
        if let Some(secret) = &self.secret {
            request = request.header(SECRET_HEADER, secret);
        }
        let response = check_status(request.send().await?).await?;
        Ok(response.status().as_u16())
    }
}

/// Builds the posted body: the payload's fields plus `event_type`, and a
/// `meta` object (empty when the payload carries none).
fn envelope(kind: &str, payload: Value) -> Value {
    let mut body = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".into(), other);
            map
        }
    };
    body.insert("event_type".into(), Value::String(kind.to_string()));
    if !body.get("meta").is_some_and(Value::is_object) {
        body.insert("meta".into(), Value::Object(Map::new()));
    }
    Value::Object(body)
}

#[async_trait]
impl EventNotifier for WebhookNotifier {
    async fn emit(&self, kind: &str, payload: Value) -> SyncResult<Delivery> {
        let Some(url) = self.endpoint() else {
            debug!(kind, "webhook disabled, event not sent");
            return Ok(Delivery::Disabled);
        };
        let body = envelope(kind, payload);

        let attempts = self.config.retries + 1;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.post(url, &body).await {
                Ok(status) => {
                    info!(kind, status, "event delivered");
                    return Ok(Delivery::Delivered { status });
                }
                Err(e) => {
                    warn!(kind, attempt, error = %e, "event delivery failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        let delay = self.config.backoff_ms * u64::from(attempt);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }
        Err(SyncError::Notification(format!(
            "{kind}: gave up after {attempts} attempts: {last_error}"
        )))
    }
}
