mod common;

use chrono::{TimeZone, Utc};
use common::FakeSheet;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tablesync_engine::{Action, ChangeEntry, PlanCounts, RunOutcome, RunSummary};
use tablesync_sync::{LogSink, MemorySink, MultiSink, SheetLogConfig, SheetLogSink, TracingSink};
use tablesync_types::{RunId, Side};

fn entry(run_id: RunId) -> ChangeEntry {
    ChangeEntry {
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        run_id,
        job: "items".into(),
        action: Action::Update,
        side: Side::Sheet,
        key: "1".into(),
        location: "row 2".into(),
        field: "Status".into(),
        old_value: "Open".into(),
        new_value: "Done".into(),
    }
}

fn summary(run_id: RunId) -> RunSummary {
    RunSummary {
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap(),
        run_id,
        job: "items".into(),
        outcome: RunOutcome::Ok,
        counts: Some(PlanCounts {
            updated: 1,
            cells: 1,
            ..Default::default()
        }),
        emitted: 0,
        digest_before: Some("aa".into()),
        digest_after: Some("bb".into()),
        message: String::new(),
    }
}

#[tokio::test]
async fn sheet_sink_ensures_headers_and_appends() {
    let sheet = Arc::new(FakeSheet::new());
    let sink = SheetLogSink::new(sheet.clone(), SheetLogConfig::default());
    let run_id = RunId::new();

    sink.write(&[entry(run_id)], &summary(run_id)).await.unwrap();
    sink.write(&[], &summary(run_id)).await.unwrap();

    let details = sheet.tab("change_details").unwrap();
    assert_eq!(details.header.len(), ChangeEntry::HEADER.len());
    assert_eq!(details.rows, vec![entry(run_id).to_row()]);

    let summaries = sheet.tab("sync_summary").unwrap();
    assert_eq!(summaries.header.len(), RunSummary::HEADER.len());
    assert_eq!(summaries.rows.len(), 2);
}

#[tokio::test]
async fn sheet_sink_skips_details_tab_when_nothing_changed() {
    let sheet = Arc::new(FakeSheet::new());
    let sink = SheetLogSink::new(sheet.clone(), SheetLogConfig::default());

    sink.write(&[], &summary(RunId::new())).await.unwrap();

    assert!(sheet.tab("change_details").is_none());
    assert!(sheet.tab("sync_summary").is_some());
}

#[tokio::test]
async fn memory_and_tracing_sinks_fan_out() {
    let memory = Arc::new(MemorySink::new());
    struct Shared(Arc<MemorySink>);

    #[async_trait::async_trait]
    impl LogSink for Shared {
        async fn write(
            &self,
            entries: &[ChangeEntry],
            summary: &RunSummary,
        ) -> tablesync_sync::SyncResult<()> {
            self.0.write(entries, summary).await
        }
    }

    let sink = MultiSink::new(vec![Box::new(TracingSink), Box::new(Shared(memory.clone()))]);
    let run_id = RunId::new();
    sink.write(&[entry(run_id)], &summary(run_id)).await.unwrap();

    assert_eq!(memory.entries().len(), 1);
    assert_eq!(memory.summaries()[0].run_id, run_id);
}
