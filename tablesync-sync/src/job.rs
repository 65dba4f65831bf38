//! Job runner.
//!
//! One invocation of a job: load metadata, read both sides, reconcile,
//! apply the plan, commit metadata, emit events, then hand the change log
//! to the log sink. A failed run commits nothing and is reported with a
//! failure summary before the error is returned.

use crate::config::{JobConfig, JobMode, WriteMode};
use crate::error::SyncResult;
use crate::log::LogSink;
use crate::store::{
    CellWrite, Delivery, EventNotifier, RemoteMutation, RemoteRead, RemoteTable, SheetStore,
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tablesync_engine::{
    append_only, mirror, two_way, union_headers, ChangeLog, ChangeLogConfig, Digest, Emission,
    KeyIndex, MutationPlan, RemoteCodec, RowRef, RunSummary, SheetCodec, SheetLayout,
    TriggerGate,
};
use tablesync_storage::MetaStore;
use tablesync_types::{BusinessKey, MetaKey, RunId, Side};
use tracing::{debug, error, info, warn};

/// Per-invocation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Ignore the digest short-circuit.
    pub force: bool,
    /// Compute and report the plan without writing anything.
    pub dry_run: bool,
}

/// Collaborators shared by every job of one invocation.
pub struct SyncContext<'a> {
    pub sheets: &'a dyn SheetStore,
    pub meta: &'a dyn MetaStore,
    pub notifier: &'a dyn EventNotifier,
    pub log: &'a dyn LogSink,
    pub change_log: ChangeLogConfig,
    /// Fail the run when an event cannot be delivered.
    pub strict_notify: bool,
}

/// Result of one successful (or skipped) run.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub summary: RunSummary,
    pub plan: MutationPlan,
    /// Events cleared by the trigger gate. In a dry run these were not sent.
    pub emissions: Vec<Emission>,
}

/// Runs one job against the given remote table.
pub async fn run_job(
    ctx: &SyncContext<'_>,
    job: &JobConfig,
    remote: &dyn RemoteTable,
    options: RunOptions,
) -> SyncResult<JobReport> {
    let mut log = ChangeLog::new(RunId::new(), job.name.clone(), ctx.change_log);
    info!(job = %job.name, run_id = %log.run_id(), mode = ?job.mode, ?options, "starting job");

    match execute(ctx, job, remote, options, &mut log).await {
        Ok(report) => {
            if let Err(e) = ctx.log.write(log.entries(), &report.summary).await {
                warn!(job = %job.name, error = %e, "failed to write change log");
            }
            Ok(report)
        }
        Err(e) => {
            error!(job = %job.name, run_id = %log.run_id(), error = %e, "job failed");
            let summary = log.finish_error(&e.to_string());
            if let Err(log_err) = ctx.log.write(&[], &summary).await {
                warn!(job = %job.name, error = %log_err, "failed to write failure summary");
            }
            Err(e)
        }
    }
}

/// Digests reported for a run and the one committed on success.
struct Digests {
    before: Option<Digest>,
    after: Option<Digest>,
    commit: Option<Digest>,
}

async fn execute(
    ctx: &SyncContext<'_>,
    job: &JobConfig,
    remote: &dyn RemoteTable,
    options: RunOptions,
    log: &mut ChangeLog,
) -> SyncResult<JobReport> {
    let mut meta = ctx.meta.load().await?;
    let tab = job.sheet_tab.as_str();

    let required = job.mapping.required_headers();
    let header = if options.dry_run {
        union_headers(&ctx.sheets.list_fields(tab).await?, &required)
    } else {
        ctx.sheets.ensure_table(tab).await?;
        ctx.sheets.ensure_fields(tab, &required).await?
    };
    let codec = SheetCodec::new(&job.mapping, SheetLayout::new(header))?;
    let rows = ctx.sheets.read_all(tab, codec.layout().width()).await?;
    let sheet = KeyIndex::build(rows.iter().map(|row| codec.decode(row)));

    let remote_codec = RemoteCodec::new(&job.mapping);
    let remote_rows = match remote.read_all().await? {
        RemoteRead::Rows(rows) => rows,
        RemoteRead::Unrecognized(detail) => {
            warn!(job = %job.name, table = remote.name(), %detail, "remote shape unrecognized, skipping");
            return Ok(JobReport {
                summary: log.finish_skipped(&format!("remote response unrecognized: {detail}"), None),
                plan: MutationPlan::default(),
                emissions: Vec::new(),
            });
        }
    };
    let remote_index = KeyIndex::build(remote_rows.iter().map(|row| remote_codec.decode(row)));
    debug!(
        job = %job.name,
        sheet_rows = rows.len(),
        sheet_keys = sheet.len(),
        remote_rows = remote_rows.len(),
        remote_keys = remote_index.len(),
        "indexed both sides"
    );

    let fields = job.mapping.content_fields();
    let digest_key = MetaKey::digest(job.digest_scope());
    let previous = meta.get(&digest_key).map(Digest::from_stored);

    let (plan, digests) = match job.mode {
        JobMode::MirrorToSheet | JobMode::UpsertToRemote => {
            let (source, target, target_side) = if job.mode == JobMode::MirrorToSheet {
                (&remote_index, &sheet, Side::Sheet)
            } else {
                (&sheet, &remote_index, Side::Remote)
            };
            let source_digest = source.digest(&fields);
            let target_digest = target.digest(&fields);
            let unchanged = previous.as_ref() == Some(&source_digest)
                && target_digest == source_digest
                && sheet.duplicates().is_empty();
            if unchanged && !options.force {
                info!(job = %job.name, digest = %source_digest, "no changes since last run");
                return Ok(JobReport {
                    summary: log.finish_skipped("unchanged", Some(source_digest.to_string())),
                    plan: MutationPlan::default(),
                    emissions: Vec::new(),
                });
            }
            let plan = mirror(source, target, target_side, &job.mapping, &job.mirror_policy());
            let digests = Digests {
                before: Some(target_digest),
                after: Some(source_digest.clone()),
                commit: Some(source_digest),
            };
            (plan, digests)
        }
        JobMode::TwoWay | JobMode::AppendOnly => {
            let plan = if job.mode == JobMode::TwoWay {
                two_way(&sheet, &remote_index, &job.mapping, job.default_winner)?
            } else {
                append_only(&sheet, &remote_index)
            };
            let digests = Digests {
                before: Some(sheet.digest(&fields)),
                after: Some(remote_index.digest(&fields)),
                commit: None,
            };
            (plan, digests)
        }
    };
    log.record_plan(&plan);
    debug!(job = %job.name, outcomes = ?plan.outcome_counts(), "plan computed");

    let mut emissions: Vec<(Side, Emission)> = Vec::new();
    {
        let mut gate = TriggerGate::new(&mut meta, Utc::now());
        for spec in &job.triggers {
            let written = match spec.side {
                Side::Sheet => &remote_index,
                Side::Remote => &sheet,
            };
            let candidates = spec.candidates(&plan, written);
            for emission in gate.admit(&spec.kind, candidates)? {
                emissions.push((spec.side, emission));
            }
        }
    }

    let counts = plan.counts();
    let before = digests.before.map(|d| d.to_string());
    let after = digests.after.map(|d| d.to_string());

    if options.dry_run {
        for (side, emission) in &emissions {
            log.record_emission(*side, emission);
        }
        info!(job = %job.name, ?counts, events = emissions.len(), "dry run, nothing written");
        let summary = RunSummary {
            message: "dry run".to_string(),
            ..log.finish_ok(counts, 0, before, after)
        };
        return Ok(JobReport {
            summary,
            plan,
            emissions: emissions.into_iter().map(|(_, e)| e).collect(),
        });
    }

    match job.mode {
        JobMode::MirrorToSheet => match job.write_mode {
            WriteMode::Delta => apply_sheet(ctx.sheets, tab, &codec, &plan, Vec::new()).await?,
            WriteMode::Full => {
                let body = full_body(&codec, &remote_index, &sheet, &rows);
                ctx.sheets.replace_body(tab, &body).await?;
            }
        },
        JobMode::UpsertToRemote => {
            apply_remote(remote, &remote_codec, &plan).await?;
            ctx.sheets
                .delete_rows(tab, &plan.delete_positions(Side::Sheet))
                .await?;
        }
        JobMode::TwoWay | JobMode::AppendOnly => {
            let created = apply_remote(remote, &remote_codec, &plan).await?;
            let pointers =
                pointer_writes(&codec, job.mapping.pointer_field(), &sheet, &created);
            apply_sheet(ctx.sheets, tab, &codec, &plan, pointers).await?;
        }
    }

    if let Some(digest) = &digests.commit {
        meta.set(&digest_key, digest.as_str());
    }
    if meta.is_dirty() {
        ctx.meta.commit(&meta).await?;
        meta.mark_clean();
    }

    let mut emitted = 0;
    for (side, emission) in &emissions {
        log.record_emission(*side, emission);
        match ctx.notifier.emit(&emission.kind, event_payload(log, emission)?).await {
            Ok(Delivery::Delivered { .. }) => emitted += 1,
            Ok(Delivery::Disabled) => {}
            Err(e) if ctx.strict_notify => return Err(e),
            Err(e) => warn!(job = %job.name, kind = %emission.kind, error = %e, "event not delivered"),
        }
    }

    let summary = log.finish_ok(counts, emitted, before, after);
    info!(
        job = %job.name,
        inserted = counts.inserted,
        updated = counts.updated,
        deleted = counts.deleted,
        duplicates = counts.duplicates,
        emitted,
        "job finished"
    );
    Ok(JobReport {
        summary,
        plan,
        emissions: emissions.into_iter().map(|(_, e)| e).collect(),
    })
}

/// Writes the sheet half of a plan: cell updates (plus `extra_cells`),
/// then deletes highest first, then appends.
async fn apply_sheet(
    sheets: &dyn SheetStore,
    tab: &str,
    codec: &SheetCodec<'_>,
    plan: &MutationPlan,
    extra_cells: Vec<CellWrite>,
) -> SyncResult<()> {
    let mut cells: Vec<CellWrite> = plan
        .updates_for(Side::Sheet)
        .filter_map(|update| match (&update.row, codec.column(&update.field)) {
            (RowRef::Position(position), Some(column)) => Some(CellWrite {
                position: *position,
                column,
                value: update.new.clone(),
            }),
            _ => {
                warn!(row = %update.row, field = %update.field, "cannot address sheet cell");
                None
            }
        })
        .collect();
    cells.extend(extra_cells);
    sheets.write_cells(tab, &cells).await?;

    sheets
        .delete_rows(tab, &plan.delete_positions(Side::Sheet))
        .await?;

    let appends: Vec<Vec<String>> = plan
        .inserts_for(Side::Sheet)
        .map(|insert| codec.encode(&insert.record))
        .collect();
    sheets.append_rows(tab, &appends).await
}

/// Writes the remote half of a plan. Returns the keys of inserted records
/// paired with the row ids the remote assigned.
async fn apply_remote(
    remote: &dyn RemoteTable,
    codec: &RemoteCodec<'_>,
    plan: &MutationPlan,
) -> SyncResult<Vec<(BusinessKey, Option<String>)>> {
    let mut mutations = Vec::new();
    let mut inserted = Vec::new();
    for insert in plan.inserts_for(Side::Remote) {
        mutations.push(RemoteMutation::Add {
            values: codec.encode(&insert.record),
        });
        inserted.push(insert.key.clone());
    }
    for (row, updates) in plan.updates_by_row(Side::Remote) {
        let RowRef::RowId(row_id) = row else {
            warn!(%row, "remote row has no id, update skipped");
            continue;
        };
        let values: Map<String, Value> = updates
            .iter()
            .filter_map(|u| {
                codec
                    .remote_column(&u.field)
                    .map(|col| (col.to_string(), Value::String(u.new.clone())))
            })
            .collect();
        if !values.is_empty() {
            mutations.push(RemoteMutation::Update {
                row_id: row_id.clone(),
                values,
            });
        }
    }
    if mutations.is_empty() {
        return Ok(Vec::new());
    }

    debug!(table = remote.name(), mutations = mutations.len(), "applying remote mutations");
    let ids = remote.apply_batch(mutations).await?;
    Ok(inserted.into_iter().zip(ids).collect())
}

/// Pointer cells for sheet rows whose record was just created remotely.
fn pointer_writes(
    codec: &SheetCodec<'_>,
    pointer_field: Option<&str>,
    sheet: &KeyIndex,
    created: &[(BusinessKey, Option<String>)],
) -> Vec<CellWrite> {
    let Some(column) = pointer_field.and_then(|field| codec.column(field)) else {
        return Vec::new();
    };
    created
        .iter()
        .filter_map(|(key, row_id)| {
            let row = sheet.get(key)?;
            Some(CellWrite {
                position: row.position,
                column,
                value: row_id.clone()?,
            })
        })
        .collect()
}

/// The sheet body a full rewrite produces: source records in source
/// order, each laid over its existing sheet row when there is one so
/// untracked cells survive.
fn full_body(
    codec: &SheetCodec<'_>,
    source: &KeyIndex,
    sheet: &KeyIndex,
    rows: &[Vec<String>],
) -> Vec<Vec<String>> {
    source
        .iter()
        .map(|indexed| {
            let existing = sheet
                .get(indexed.record.key())
                .and_then(|row| rows.get(row.position));
            match existing {
                Some(existing) => codec.overlay(&indexed.record, existing),
                None => codec.encode(&indexed.record),
            }
        })
        .collect()
}

/// The JSON body of an emitted event.
fn event_payload(log: &ChangeLog, emission: &Emission) -> SyncResult<Value> {
    let mut payload = serde_json::to_value(emission)?;
    if let Value::Object(map) = &mut payload {
        map.insert(
            "meta".into(),
            json!({
                "run_id": log.run_id().to_string(),
                "job": log.job(),
                "source": "tablesync",
            }),
        );
    }
    Ok(payload)
}
