//! Command-line front end for tablesync.
//!
//! Wires the configured backends together and runs the selected jobs one
//! after another. A failing job is logged and counted; the remaining jobs
//! still run.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tablesync_engine::RunOutcome;
use tablesync_storage::{MetaStore, SqliteMetaStore};
use tablesync_sync::{
    run_job, AppConfig, GlideTable, JobConfig, JobReport, LogSink, MetaBackend, MultiSink,
    RunOptions, Secrets, SheetLogSink, SheetMetaStore, SheetsClient, SyncContext, SyncResult,
    TracingSink, WebhookNotifier,
};
use tracing::{error, info};

#[derive(Parser, Debug, Clone)]
#[command(name = "tablesync")]
#[command(about = "Reconcile a spreadsheet tab with a remote table")]
pub struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "tablesync.json")]
    pub config: PathBuf,

    /// Run only the named job (repeatable)
    #[arg(short, long = "job", value_name = "NAME")]
    pub jobs: Vec<String>,

    /// Reconcile even when the stored digest says nothing changed
    #[arg(long)]
    pub force: bool,

    /// Compute and log the plan without writing to either store
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            force: self.force,
            dry_run: self.dry_run,
        }
    }
}

/// Outcome counts across one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    pub fn record(&mut self, result: &SyncResult<JobReport>) {
        match result.as_ref().map(|r| r.summary.outcome) {
            Ok(RunOutcome::Ok) => self.ok += 1,
            Ok(RunOutcome::Skipped) => self.skipped += 1,
            Ok(RunOutcome::Error) | Err(_) => self.failed += 1,
        }
    }

    /// True when no job failed.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Jobs to run: the named ones in the order given, or every enabled job.
///
/// A job named explicitly runs even when disabled in the config.
pub fn select_jobs<'a>(config: &'a AppConfig, names: &[String]) -> Result<Vec<&'a JobConfig>> {
    if names.is_empty() {
        return Ok(config.jobs.iter().filter(|j| j.enabled).collect());
    }
    let mut selected: Vec<&JobConfig> = Vec::new();
    for name in names {
        let job = config
            .job(name)
            .with_context(|| format!("no job named {name:?} in config"))?;
        if !selected.iter().any(|j| j.name == job.name) {
            selected.push(job);
        }
    }
    Ok(selected)
}

/// Loads the config and secrets, then runs the selected jobs.
pub async fn run(args: &Args) -> Result<Tally> {
    let config = AppConfig::from_file(&args.config)?;
    let secrets = Secrets::from_env(&config.secrets)?;
    run_with(&config, &secrets, args).await
}

/// Runs the selected jobs with an already loaded config.
pub async fn run_with(config: &AppConfig, secrets: &Secrets, args: &Args) -> Result<Tally> {
    let jobs = select_jobs(config, &args.jobs)?;
    if jobs.is_empty() {
        info!("no enabled jobs");
        return Ok(Tally::default());
    }

    let sheets = Arc::new(SheetsClient::new(
        config.sheets.clone(),
        secrets.sheets_token.clone(),
        config.retry,
    )?);
    let meta = meta_store(config, &sheets)?;
    let notifier = WebhookNotifier::new(config.webhook.clone(), secrets.webhook_secret.clone())?;
    let log = log_sink(config, &sheets, args.dry_run);

    let ctx = SyncContext {
        sheets: sheets.as_ref(),
        meta: meta.as_ref(),
        notifier: &notifier,
        log: log.as_ref(),
        change_log: config.log.change_log,
        strict_notify: config.webhook.strict,
    };

    let mut tally = Tally::default();
    for job in jobs {
        let result = match GlideTable::new(
            config.remote.clone(),
            job.remote_table.clone(),
            secrets.remote_token.clone(),
            config.retry,
        ) {
            Ok(remote) => run_job(&ctx, job, &remote, args.run_options()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!(job = %job.name, error = %e, "job did not complete");
        }
        tally.record(&result);
    }

    info!(
        ok = tally.ok,
        skipped = tally.skipped,
        failed = tally.failed,
        "all jobs finished"
    );
    Ok(tally)
}

fn meta_store(config: &AppConfig, sheets: &Arc<SheetsClient>) -> Result<Box<dyn MetaStore>> {
    Ok(match &config.meta {
        MetaBackend::Sheet { tab } => Box::new(SheetMetaStore::new(Arc::clone(sheets), tab.clone())),
        MetaBackend::Sqlite { path } => Box::new(
            SqliteMetaStore::new(path)
                .with_context(|| format!("cannot open metadata database {}", path.display()))?,
        ),
    })
}

fn log_sink(config: &AppConfig, sheets: &Arc<SheetsClient>, dry_run: bool) -> Box<dyn LogSink> {
    match &config.log.sheet {
        Some(sheet) if !dry_run => Box::new(MultiSink::new(vec![
            Box::new(TracingSink),
            Box::new(SheetLogSink::new(Arc::clone(sheets), sheet.clone())),
        ])),
        _ => Box::new(TracingSink),
    }
}
