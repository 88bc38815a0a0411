//! # simcheck-coordinator
//!
//! **Tier 2 (Orchestration)**
//!
//! Decides when an assignment's auto-analysis actually runs (spec.md
//! §4.7, §5): debouncing bursts of submission-triggered events,
//! collapsing a trigger that lands mid-analysis into a single rerun,
//! and periodically reconciling assignments whose report has gone
//! stale without ever being triggered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use simcheck_pipeline::{Cancellation, Pipeline};
use simcheck_ports::{Clock, ReportStore, SubmissionCatalog};
use simcheck_types::Options;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Status {
    #[default]
    Idle,
    /// A debounce timer is running; it may still be aborted and
    /// restarted by a later trigger.
    Scheduled,
    InProgress,
    /// A trigger arrived while `InProgress`; rerun once the current
    /// analysis finishes instead of starting a second one concurrently.
    PendingRerun,
}

#[derive(Default)]
struct AssignmentState {
    status: Status,
    debounce_handle: Option<tokio::task::AbortHandle>,
}

/// Schedules `Pipeline::trigger_auto_analysis` calls per assignment.
pub struct Coordinator {
    pipeline: Arc<Pipeline>,
    catalog: Arc<dyn SubmissionCatalog>,
    report_store: Arc<dyn ReportStore>,
    clock: Arc<dyn Clock>,
    states: Mutex<HashMap<u64, AssignmentState>>,
    reconciling: AtomicBool,
    /// Options reconciliation runs self-discovered assignments with,
    /// since `SubmissionCatalog::latest_snapshots` has no per-assignment
    /// options to hand back (spec.md §4.7).
    default_options: Options,
}

impl Coordinator {
    pub fn new(
        pipeline: Arc<Pipeline>,
        catalog: Arc<dyn SubmissionCatalog>,
        report_store: Arc<dyn ReportStore>,
        clock: Arc<dyn Clock>,
        default_options: Options,
    ) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            catalog,
            report_store,
            clock,
            states: Mutex::new(HashMap::new()),
            reconciling: AtomicBool::new(false),
            default_options,
        })
    }

    /// Record one trigger for `assignment_id`. Returns immediately;
    /// the actual analysis (if any) runs on a spawned task after the
    /// configured debounce window.
    pub fn trigger(self: &Arc<Self>, assignment_id: u64, options: Options) {
        if !options.auto.enabled {
            return;
        }
        let mut states = self.states.lock().unwrap();
        let state = states.entry(assignment_id).or_default();

        match state.status {
            Status::InProgress => {
                state.status = Status::PendingRerun;
            }
            Status::PendingRerun => {
                // Already queued for a rerun; this trigger adds nothing.
            }
            Status::Idle | Status::Scheduled => {
                if let Some(handle) = state.debounce_handle.take() {
                    handle.abort();
                }
                state.status = Status::Scheduled;
                let this = Arc::clone(self);
                let debounce_ms = options.auto.debounce_ms;
                let opts = options.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(debounce_ms)).await;
                    this.run_debounced(assignment_id, opts).await;
                });
                state.debounce_handle = Some(task.abort_handle());
            }
        }
    }

    async fn run_debounced(self: &Arc<Self>, assignment_id: u64, options: Options) {
        {
            let mut states = self.states.lock().unwrap();
            let state = states.entry(assignment_id).or_default();
            state.status = Status::InProgress;
            state.debounce_handle = None;
        }

        let cancellation = Cancellation::new();
        if let Err(e) = self.pipeline.trigger_auto_analysis(assignment_id, &options, &cancellation).await {
            tracing::warn!(assignment_id, error = %e, "auto-analysis run failed");
        }

        let rerun = {
            let mut states = self.states.lock().unwrap();
            let state = states.entry(assignment_id).or_default();
            let was_pending = state.status == Status::PendingRerun;
            state.status = Status::Idle;
            was_pending
        };
        if rerun {
            self.trigger(assignment_id, options);
        }
    }

    /// True when this assignment is worth running again: it exists and
    /// is active, enough submissions exist, and no current report
    /// covers them — either none has ever been produced, the
    /// submission count has moved on since the stored one, or a
    /// submission has landed since the stored report was generated
    /// (spec.md §4.7, boundary scenario §8.8).
    pub async fn should_analyze(&self, assignment_id: u64, options: &Options) -> anyhow::Result<bool> {
        match self.catalog.assignment(assignment_id).await? {
            None => return Ok(false),
            Some(info) if !info.is_active => return Ok(false),
            Some(_) => {}
        }

        let submissions = self.catalog.latest_submissions(assignment_id).await?;
        if submissions.len() < options.auto.min_latest_submissions {
            return Ok(false);
        }
        let max_submitted_at = submissions.iter().filter_map(|s| s.submitted_at).max().unwrap_or(0);

        match self.report_store.latest_for_assignment(assignment_id).await? {
            None => Ok(true),
            Some((_, bytes)) => {
                let persisted = simcheck_persistence::deserialize_report(&bytes)?;
                let current = persisted.summary.total_files == submissions.len() && persisted.generated_at_ms >= max_submitted_at;
                Ok(!current)
            }
        }
    }

    /// One reconciliation pass, self-discovered via the catalog's
    /// cheap snapshot scan rather than a caller-supplied assignment
    /// list (spec.md §4.7, §6.5). A pass already in flight makes a
    /// second call a no-op rather than overlapping it — reconciliation
    /// is a safety net, not a hot path, so a skipped tick just waits
    /// for the next one.
    pub async fn reconcile_once(self: &Arc<Self>) {
        if self.reconciling.swap(true, Ordering::SeqCst) {
            tracing::debug!("reconciliation already running, skipping this tick");
            return;
        }

        let min_count = self.default_options.auto.min_latest_submissions;
        match self.catalog.latest_snapshots(min_count).await {
            Ok(snapshots) => {
                for snapshot in snapshots {
                    let options = self.default_options.clone();
                    match self.should_analyze(snapshot.assignment_id, &options).await {
                        Ok(true) => self.trigger(snapshot.assignment_id, options),
                        Ok(false) => {}
                        Err(e) => {
                            tracing::warn!(assignment_id = snapshot.assignment_id, error = %e, "reconciliation check failed")
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "reconciliation snapshot scan failed"),
        }

        self.reconciling.store(false, Ordering::SeqCst);
    }

    /// Spawn a background task that calls `reconcile_once` on a fixed
    /// interval until the returned handle is aborted or dropped.
    pub fn spawn_reconciliation_loop(self: Arc<Self>, interval_ms: u64) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            loop {
                ticker.tick().await;
                self.reconcile_once().await;
            }
        })
    }

    #[cfg(test)]
    fn status_for_test(&self, assignment_id: u64) -> Option<Status> {
        self.states.lock().unwrap().get(&assignment_id).map(|s| s.status)
    }
}
