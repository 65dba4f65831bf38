//! Application configuration.
//!
//! A single JSON file describes the backends and the jobs. It is parsed
//! and validated once at startup; secrets are read from the environment
//! variables it names.

use crate::error::{SyncError, SyncResult};
use crate::glide::GlideConfig;
use crate::log::SheetLogConfig;
use crate::notifier::WebhookConfig;
use crate::retry::RetryPolicy;
use crate::sheets::SheetsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tablesync_engine::{ChangeLogConfig, MirrorPolicy, TriggerSpec};
use tablesync_types::{FieldMapping, MetaKey, Side};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sheets: SheetsConfig,
    pub remote: GlideConfig,
    pub webhook: WebhookConfig,
    pub retry: RetryPolicy,
    pub secrets: SecretsConfig,
    pub meta: MetaBackend,
    pub log: LogConfig,
    pub jobs: Vec<JobConfig>,
}

/// Names of the environment variables holding secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub sheets_token_env: String,
    pub remote_token_env: String,
    pub webhook_secret_env: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            sheets_token_env: "TABLESYNC_SHEETS_TOKEN".to_string(),
            remote_token_env: "TABLESYNC_REMOTE_TOKEN".to_string(),
            webhook_secret_env: "TABLESYNC_WEBHOOK_SECRET".to_string(),
        }
    }
}

/// Where the metadata table lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum MetaBackend {
    /// A tab of the configured spreadsheet.
    Sheet { tab: String },
    /// A local SQLite file.
    Sqlite { path: PathBuf },
}

impl Default for MetaBackend {
    fn default() -> Self {
        Self::Sheet {
            tab: "_meta".to_string(),
        }
    }
}

/// Change-log settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Also append to sheet log tabs when set.
    pub sheet: Option<SheetLogConfig>,
    #[serde(flatten)]
    pub change_log: ChangeLogConfig,
}

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Remote authoritative, sheet mirrors.
    MirrorToSheet,
    /// Sheet authoritative, remote gets inserts and updates.
    UpsertToRemote,
    /// Bidirectional, last write wins.
    TwoWay,
    /// Bidirectional union, nothing updated or deleted.
    AppendOnly,
}

/// How mirror changes reach the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Cell updates, deletes and appends.
    #[default]
    Delta,
    /// Rewrite the whole body.
    Full,
}

fn default_winner() -> Side {
    Side::Sheet
}

/// One configured job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub mode: JobMode,
    pub sheet_tab: String,
    pub remote_table: String,
    pub mapping: FieldMapping,
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Overrides the mode's default mirror policy.
    #[serde(default)]
    pub policy: Option<MirrorPolicy>,
    /// Two-way winner when timestamps tie or cannot be compared.
    #[serde(default = "default_winner")]
    pub default_winner: Side,
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
    /// Digest scope; defaults to the job name.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

fn enabled() -> bool {
    true
}

impl JobConfig {
    /// Scope under which this job's digest is stored.
    #[must_use]
    pub fn digest_scope(&self) -> &str {
        self.scope.as_deref().unwrap_or(&self.name)
    }

    /// The mirror policy in effect for this job's mode.
    #[must_use]
    pub fn mirror_policy(&self) -> MirrorPolicy {
        self.policy.unwrap_or(match self.mode {
            JobMode::UpsertToRemote => MirrorPolicy::upsert(),
            _ => MirrorPolicy::default(),
        })
    }

    fn validate(&self) -> SyncResult<()> {
        let fail = |msg: String| Err(SyncError::Configuration(format!("job {:?}: {msg}", self.name)));

        if self.sheet_tab.trim().is_empty() {
            return fail("sheet_tab is empty".into());
        }
        if self.remote_table.trim().is_empty() {
            return fail("remote_table is empty".into());
        }
        if self.mode == JobMode::TwoWay && self.mapping.timestamps().is_none() {
            return fail("two_way requires mapping.timestamps".into());
        }
        if self.mode != JobMode::MirrorToSheet && self.write_mode == WriteMode::Full {
            return fail("write_mode full only applies to mirror_to_sheet".into());
        }
        if self.mode == JobMode::UpsertToRemote && self.mirror_policy().delete_missing {
            return fail("upsert_to_remote cannot delete remote rows".into());
        }
        for trigger in &self.triggers {
            if let Err(e) = MetaKey::trigger(trigger.kind.clone(), "_") {
                return fail(e.to_string());
            }
        }
        Ok(())
    }
}

impl AppConfig {
    /// Reads and validates a config file.
    pub fn from_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SyncError::Configuration(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        Self::parse(&raw)
    }

    /// Parses and validates a config document.
    pub fn parse(raw: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| SyncError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that can be checked without I/O.
    pub fn validate(&self) -> SyncResult<()> {
        if self.jobs.is_empty() {
            return Err(SyncError::Configuration("no jobs configured".into()));
        }
        if self.sheets.spreadsheet_id.trim().is_empty() {
            return Err(SyncError::Configuration("sheets.spreadsheet_id is empty".into()));
        }
        if self.remote.app_id.trim().is_empty() {
            return Err(SyncError::Configuration("remote.app_id is empty".into()));
        }
        if self.remote.mutation_chunk == 0 {
            return Err(SyncError::Configuration("remote.mutation_chunk must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::Configuration("retry.max_attempts must be positive".into()));
        }

        let mut reserved: Vec<&str> = Vec::new();
        if let MetaBackend::Sheet { tab } = &self.meta {
            if tab.trim().is_empty() {
                return Err(SyncError::Configuration("meta tab is empty".into()));
            }
            reserved.push(tab);
        }
        if let Some(sheet) = &self.log.sheet {
            reserved.push(&sheet.details_tab);
            reserved.push(&sheet.summary_tab);
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                return Err(SyncError::Configuration("job with empty name".into()));
            }
            if !names.insert(job.name.as_str()) {
                return Err(SyncError::Configuration(format!("duplicate job {:?}", job.name)));
            }
            if reserved.contains(&job.sheet_tab.as_str()) {
                return Err(SyncError::Configuration(format!(
                    "job {:?} writes to reserved tab {:?}",
                    job.name, job.sheet_tab
                )));
            }
            job.validate()?;
        }
        Ok(())
    }

    /// Looks up a job by name.
    #[must_use]
    pub fn job(&self, name: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

/// Secrets resolved at startup.
#[derive(Clone)]
pub struct Secrets {
    pub sheets_token: String,
    pub remote_token: String,
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("sheets_token", &"<redacted>")
            .field("remote_token", &"<redacted>")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Secrets {
    /// Reads secrets from the process environment.
    pub fn from_env(config: &SecretsConfig) -> SyncResult<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Reads secrets through `lookup`. Both tokens are required.
    pub fn resolve<F>(config: &SecretsConfig, lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &str| {
            value(name).ok_or_else(|| {
                SyncError::Configuration(format!("environment variable {name} is not set"))
            })
        };
        Ok(Self {
            sheets_token: required(&config.sheets_token_env)?,
            remote_token: required(&config.remote_token_env)?,
            webhook_secret: value(&config.webhook_secret_env),
        })
    }
}
