//! Audit trail: one entry per mutation and one summary per run.

use crate::plan::{MutationPlan, PlanCounts};
use crate::trigger::Emission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tablesync_types::{RunId, Side};

/// Characters reserved for the `...(<len>c)` truncation marker.
const CLIP_MARKER_RESERVE: usize = 12;

/// Truncates a value to at most `max` characters plus a marker carrying
/// the original length. `max == 0` disables truncation.
#[must_use]
pub fn clip(value: &str, max: usize) -> String {
    let len = value.chars().count();
    if max == 0 || len <= max {
        return value.to_string();
    }
    let head: String = value.chars().take(max.saturating_sub(CLIP_MARKER_RESERVE)).collect();
    format!("{head}...({len}c)")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Insert,
    Update,
    Delete,
    DeleteDuplicate,
    Emit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::DeleteDuplicate => "delete_duplicate",
            Self::Emit => "emit",
        };
        f.write_str(s)
    }
}

/// One audited mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    pub job: String,
    pub action: Action,
    pub side: Side,
    pub key: String,
    pub location: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

impl ChangeEntry {
    /// Column names for tabular sinks.
    pub const HEADER: &'static [&'static str] = &[
        "timestamp", "run_id", "job", "action", "side", "key", "location", "field", "old_value",
        "new_value",
    ];

    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.to_rfc3339(),
            self.run_id.to_string(),
            self.job.clone(),
            self.action.to_string(),
            self.side.to_string(),
            self.key.clone(),
            self.location.clone(),
            self.field.clone(),
            self.old_value.clone(),
            self.new_value.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Ok,
    Skipped,
    Error,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// The single summary entry written for every run.
///
/// Failed runs carry no counts: what was applied before the failure is
/// unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    pub job: String,
    pub outcome: RunOutcome,
    pub counts: Option<PlanCounts>,
    pub emitted: usize,
    pub digest_before: Option<String>,
    pub digest_after: Option<String>,
    pub message: String,
}

impl RunSummary {
    /// Column names for tabular sinks.
    pub const HEADER: &'static [&'static str] = &[
        "timestamp", "run_id", "job", "outcome", "inserted", "updated", "cells", "deleted",
        "duplicates", "emitted", "digest_before", "digest_after", "message",
    ];

    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        let count = |f: fn(&PlanCounts) -> usize| {
            self.counts.as_ref().map(|c| f(c).to_string()).unwrap_or_default()
        };
        vec![
            self.timestamp.to_rfc3339(),
            self.run_id.to_string(),
            self.job.clone(),
            self.outcome.to_string(),
            count(|c| c.inserted),
            count(|c| c.updated),
            count(|c| c.cells),
            count(|c| c.deleted),
            count(|c| c.duplicates),
            self.emitted.to_string(),
            self.digest_before.clone().unwrap_or_default(),
            self.digest_after.clone().unwrap_or_default(),
            self.message.clone(),
        ]
    }
}

/// Change log settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeLogConfig {
    /// Record per-mutation entries (the summary is always recorded).
    pub details: bool,
    /// Maximum characters per logged value; 0 disables truncation.
    pub max_value_len: usize,
    /// Maximum detail entries per run; further entries are counted only.
    pub max_details: usize,
}

impl Default for ChangeLogConfig {
    fn default() -> Self {
        Self {
            details: true,
            max_value_len: 500,
            max_details: 5000,
        }
    }
}

/// Collects the audit trail of one run.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    run_id: RunId,
    job: String,
    config: ChangeLogConfig,
    entries: Vec<ChangeEntry>,
    dropped: usize,
}

impl ChangeLog {
    pub fn new(run_id: RunId, job: impl Into<String>, config: ChangeLogConfig) -> Self {
        Self {
            run_id,
            job: job.into(),
            config,
            entries: Vec::new(),
            dropped: 0,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }

    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        action: Action,
        side: Side,
        key: &str,
        location: String,
        field: &str,
        old_value: &str,
        new_value: &str,
    ) {
        if !self.config.details {
            return;
        }
        if self.config.max_details > 0 && self.entries.len() >= self.config.max_details {
            self.dropped += 1;
            return;
        }
        let max = self.config.max_value_len;
        self.entries.push(ChangeEntry {
            timestamp: Utc::now(),
            run_id: self.run_id,
            job: self.job.clone(),
            action,
            side,
            key: clip(key, max),
            location,
            field: field.to_string(),
            old_value: clip(old_value, max),
            new_value: clip(new_value, max),
        });
    }

    /// Records every mutation of a plan.
    pub fn record_plan(&mut self, plan: &MutationPlan) {
        for insert in &plan.inserts {
            let values: BTreeMap<&str, &str> = insert.record.fields().collect();
            let rendered = serde_json::to_string(&values).unwrap_or_default();
            self.push(
                Action::Insert,
                insert.side,
                insert.key.as_str(),
                "append".to_string(),
                "",
                "",
                &rendered,
            );
        }
        for update in &plan.updates {
            self.push(
                Action::Update,
                update.side,
                update.key.as_str(),
                update.row.to_string(),
                &update.field,
                &update.old,
                &update.new,
            );
        }
        for (action, deletes) in [
            (Action::Delete, &plan.deletes),
            (Action::DeleteDuplicate, &plan.duplicate_deletes),
        ] {
            for delete in deletes {
                self.push(
                    action,
                    delete.side,
                    delete.key.as_str(),
                    format!("row {}", delete.position + 2),
                    "",
                    "",
                    "",
                );
            }
        }
    }

    /// Records an emitted event.
    pub fn record_emission(&mut self, side: Side, emission: &Emission) {
        self.push(
            Action::Emit,
            side,
            emission.key.as_str(),
            String::new(),
            &emission.kind,
            "",
            &emission.domain_id,
        );
    }

    #[must_use]
    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    /// Entries not recorded because of the per-run cap.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn summary(&self, outcome: RunOutcome, message: &str) -> RunSummary {
        RunSummary {
            timestamp: Utc::now(),
            run_id: self.run_id,
            job: self.job.clone(),
            outcome,
            counts: None,
            emitted: 0,
            digest_before: None,
            digest_after: None,
            message: clip(message, self.config.max_value_len),
        }
    }

    /// Summary of a completed run.
    #[must_use]
    pub fn finish_ok(
        &self,
        counts: PlanCounts,
        emitted: usize,
        digest_before: Option<String>,
        digest_after: Option<String>,
    ) -> RunSummary {
        let message = if self.dropped > 0 {
            format!("{} detail entries not recorded", self.dropped)
        } else {
            String::new()
        };
        RunSummary {
            counts: Some(counts),
            emitted,
            digest_before,
            digest_after,
            ..self.summary(RunOutcome::Ok, &message)
        }
    }

    /// Summary of a run that decided there was nothing to do.
    #[must_use]
    pub fn finish_skipped(&self, reason: &str, digest: Option<String>) -> RunSummary {
        RunSummary {
            counts: Some(PlanCounts::default()),
            digest_before: digest.clone(),
            digest_after: digest,
            ..self.summary(RunOutcome::Skipped, reason)
        }
    }

    /// Summary of a failed run. Counts are unknown.
    #[must_use]
    pub fn finish_error(&self, message: &str) -> RunSummary {
        self.summary(RunOutcome::Error, message)
    }
}
