//! # simcheck-ports
//!
//! **Tier 2 (Orchestration boundary)**
//!
//! Trait interfaces for the four collaborators `simcheck-pipeline` and
//! `simcheck-coordinator` depend on but don't own (spec.md §6): file
//! bytes, the submission catalog, report storage, and wall-clock time.
//! `ReportStore` deliberately speaks in opaque bytes rather than a
//! concrete report type — the encoding lives one tier up, in
//! `simcheck-persistence`, and this crate must not depend on it.

mod memory;

pub use memory::{InMemoryFileStore, InMemoryReportStore, InMemorySubmissionCatalog, ManualClock, SystemClock};

use async_trait::async_trait;
use simcheck_types::{FileIdentity, ReportId};

/// Reads submission source bytes by path. Implementations may back
/// onto a local filesystem, object storage, or (in tests) memory.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read_file(&self, path: &str) -> anyhow::Result<Vec<u8>>;
}

/// Resolves which files belong to an assignment right now, so the
/// pipeline and coordinator never need to know how submissions are
/// tracked upstream.
#[async_trait]
pub trait SubmissionCatalog: Send + Sync {
    async fn latest_submissions(&self, assignment_id: u64) -> anyhow::Result<Vec<FileIdentity>>;

    /// Cheap per-assignment summaries for every assignment with at
    /// least `min_count` current submissions, so reconciliation can
    /// self-discover stale assignments instead of needing a caller-
    /// supplied assignment list (spec.md §4.7, §6.5).
    async fn latest_snapshots(&self, min_count: usize) -> anyhow::Result<Vec<LatestSnapshot>>;

    /// `None` if no such assignment exists.
    async fn assignment(&self, assignment_id: u64) -> anyhow::Result<Option<AssignmentInfo>>;
}

/// One assignment's current submission state, for reconciliation's
/// initial cheap scan (spec.md §6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestSnapshot {
    pub assignment_id: u64,
    pub latest_count: usize,
    pub latest_submitted_at: Option<u64>,
}

/// Minimal assignment metadata the coordinator needs: whether it's
/// still open for analysis at all (spec.md §4.7 `should_analyze`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentInfo {
    pub is_active: bool,
}

/// Opaque report persistence. `bytes` is whatever `simcheck-persistence`
/// serialized; this trait never interprets it.
///
/// `persist` may fail with a [`ReportStoreError::Conflict`] wrapped in
/// the returned `anyhow::Error` (downcast with
/// `err.downcast_ref::<ReportStoreError>()`) when a concurrent writer
/// raced this one for the same assignment (spec.md §7). Any other
/// failure is a non-retryable storage failure.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn persist(&self, assignment_id: u64, bytes: Vec<u8>) -> anyhow::Result<ReportId>;
    async fn load(&self, report_id: ReportId) -> anyhow::Result<Option<Vec<u8>>>;
    async fn latest_for_assignment(&self, assignment_id: u64) -> anyhow::Result<Option<(ReportId, Vec<u8>)>>;
    async fn delete(&self, report_id: ReportId) -> anyhow::Result<()>;
}

/// Typed errors a [`ReportStore`] implementation can wrap inside its
/// `anyhow::Error` so callers can distinguish a retryable race from an
/// outright storage failure without this trait losing its
/// implementation-agnostic, opaque-bytes shape.
#[derive(Debug, thiserror::Error)]
pub enum ReportStoreError {
    /// Another writer persisted a report for this assignment between
    /// this caller's read and write (spec.md §7 `PersistenceConflict`).
    #[error("a newer report already exists for this assignment")]
    Conflict,
}

/// Wall-clock access, abstracted so the coordinator's debounce and
/// reconciliation timers are deterministically testable.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}
