//! tablesync
//!
//! Runs configured reconciliation jobs between a spreadsheet and a remote
//! table, then exits. Meant to be invoked from cron or a CI schedule.
//!
//! Usage:
//!   tablesync --config tablesync.json [--job NAME] [--force] [--dry-run]
//!
//! Tokens are read from the environment variables named in the config.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tablesync_cli::{run, Args};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!(config = %args.config.display(), dry_run = args.dry_run, "tablesync starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match runtime.block_on(run(&args)) {
        Ok(tally) if tally.succeeded() => Ok(ExitCode::SUCCESS),
        Ok(tally) => {
            error!(failed = tally.failed, "some jobs failed");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "tablesync aborted");
            Ok(ExitCode::from(2))
        }
    }
}
