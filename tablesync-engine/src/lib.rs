//! Reconciliation engine for tablesync.
//!
//! Everything in this crate is a pure, synchronous function of its inputs:
//!
//! - [`SheetCodec`] / [`RemoteCodec`]: native rows to [`CanonicalRecord`]s and back
//! - [`KeyIndex`]: business key to retained record, with duplicate detection
//! - [`digest()`]: order-insensitive content digest of a record set
//! - [`mirror`], [`two_way`], [`append_only`]: diff-merge into a [`MutationPlan`]
//! - [`TriggerGate`]: at-most-once event emission over persisted flags
//! - [`ChangeLog`]: per-mutation audit entries and one run summary
//!
//! The backing stores, the metadata store and the event transport live in
//! `tablesync-sync` and `tablesync-storage`; this crate never sees raw
//! backend responses.
//!
//! [`CanonicalRecord`]: tablesync_types::CanonicalRecord

mod changelog;
mod codec;
mod conflict;
mod digest;
mod error;
mod index;
mod plan;
mod reconcile;
mod trigger;

pub use changelog::{
    clip, Action, ChangeEntry, ChangeLog, ChangeLogConfig, RunOutcome, RunSummary,
};
pub use codec::{normalize_remote_value, union_headers, RemoteCodec, SheetCodec, SheetLayout};
pub use conflict::{resolve, resolve_raw, Resolution};
pub use digest::{digest, Digest, EMPTY_DIGEST};
pub use error::{EngineError, EngineResult};
pub use index::{Duplicate, IndexedRecord, KeyIndex};
pub use plan::{CellUpdate, Delete, Insert, KeyOutcome, MutationPlan, Outcome, PlanCounts, RowRef};
pub use reconcile::{append_only, mirror, two_way, MirrorPolicy};
pub use trigger::{Emission, TriggerCandidate, TriggerGate, TriggerRule, TriggerSpec};
