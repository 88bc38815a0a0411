//! In-memory reference adapters for the port traits. Used by
//! `simcheck-pipeline`/`simcheck-coordinator` tests and as the default
//! wiring for `simcheck-cli` single-shot runs that don't need a real
//! store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use simcheck_types::{FileIdentity, ReportId};

use crate::{AssignmentInfo, Clock, FileStore, LatestSnapshot, ReportStore, SubmissionCatalog};

#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.into(), bytes.into());
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn read_file(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file in store: {path}"))
    }
}

#[derive(Debug, Default)]
pub struct InMemorySubmissionCatalog {
    by_assignment: Mutex<HashMap<u64, Vec<FileIdentity>>>,
    /// Assignments not present here are treated as active — tests only
    /// need to set this when they want to exercise the inactive case.
    active: Mutex<HashMap<u64, bool>>,
}

impl InMemorySubmissionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_submissions(&self, assignment_id: u64, files: Vec<FileIdentity>) {
        self.by_assignment.lock().unwrap().insert(assignment_id, files);
    }

    pub fn set_active(&self, assignment_id: u64, active: bool) {
        self.active.lock().unwrap().insert(assignment_id, active);
    }
}

#[async_trait]
impl SubmissionCatalog for InMemorySubmissionCatalog {
    async fn latest_submissions(&self, assignment_id: u64) -> anyhow::Result<Vec<FileIdentity>> {
        Ok(self
            .by_assignment
            .lock()
            .unwrap()
            .get(&assignment_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_snapshots(&self, min_count: usize) -> anyhow::Result<Vec<LatestSnapshot>> {
        Ok(self
            .by_assignment
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, files)| files.len() >= min_count)
            .map(|(&assignment_id, files)| LatestSnapshot {
                assignment_id,
                latest_count: files.len(),
                latest_submitted_at: files.iter().filter_map(|f| f.submitted_at).max(),
            })
            .collect())
    }

    async fn assignment(&self, assignment_id: u64) -> anyhow::Result<Option<AssignmentInfo>> {
        if !self.by_assignment.lock().unwrap().contains_key(&assignment_id) {
            return Ok(None);
        }
        let is_active = self.active.lock().unwrap().get(&assignment_id).copied().unwrap_or(true);
        Ok(Some(AssignmentInfo { is_active }))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    next_id: Mutex<u64>,
    reports: Mutex<HashMap<ReportId, (u64, Vec<u8>)>>,
    latest: Mutex<HashMap<u64, ReportId>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn persist(&self, assignment_id: u64, bytes: Vec<u8>) -> anyhow::Result<ReportId> {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        self.reports.lock().unwrap().insert(id, (assignment_id, bytes));
        self.latest.lock().unwrap().insert(assignment_id, id);
        Ok(id)
    }

    async fn load(&self, report_id: ReportId) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.reports.lock().unwrap().get(&report_id).map(|(_, bytes)| bytes.clone()))
    }

    async fn latest_for_assignment(&self, assignment_id: u64) -> anyhow::Result<Option<(ReportId, Vec<u8>)>> {
        let id = match self.latest.lock().unwrap().get(&assignment_id).copied() {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(self
            .reports
            .lock()
            .unwrap()
            .get(&id)
            .map(|(_, bytes)| (id, bytes.clone())))
    }

    async fn delete(&self, report_id: ReportId) -> anyhow::Result<()> {
        let removed = self.reports.lock().unwrap().remove(&report_id);
        if let Some((assignment_id, _)) = removed {
            let mut latest = self.latest.lock().unwrap();
            if latest.get(&assignment_id) == Some(&report_id) {
                latest.remove(&assignment_id);
            }
        }
        Ok(())
    }
}

/// Real wall clock, backed by `SystemTime`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock a test can step forward on demand, for debounce/reconciliation
/// interval assertions that must not depend on real elapsed time.
#[derive(Debug)]
pub struct ManualClock {
    millis: Mutex<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            millis: Mutex::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        *self.millis.lock().unwrap() = ms;
    }

    pub fn advance(&self, delta_ms: u64) {
        *self.millis.lock().unwrap() += delta_ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        *self.millis.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips_bytes() {
        let store = InMemoryFileStore::new();
        store.put("a.py", b"print(1)".to_vec());
        let bytes = store.read_file("a.py").await.unwrap();
        assert_eq!(bytes, b"print(1)");
    }

    #[tokio::test]
    async fn file_store_missing_path_errors() {
        let store = InMemoryFileStore::new();
        assert!(store.read_file("missing.py").await.is_err());
    }

    #[tokio::test]
    async fn report_store_tracks_latest_per_assignment() {
        let store = InMemoryReportStore::new();
        let id1 = store.persist(1, b"v1".to_vec()).await.unwrap();
        let id2 = store.persist(1, b"v2".to_vec()).await.unwrap();
        assert_ne!(id1, id2);

        let (latest_id, bytes) = store.latest_for_assignment(1).await.unwrap().unwrap();
        assert_eq!(latest_id, id2);
        assert_eq!(bytes, b"v2");
    }

    #[tokio::test]
    async fn report_store_delete_clears_latest_pointer() {
        let store = InMemoryReportStore::new();
        let id = store.persist(1, b"v1".to_vec()).await.unwrap();
        store.delete(id).await.unwrap();
        assert!(store.load(id).await.unwrap().is_none());
        assert!(store.latest_for_assignment(1).await.unwrap().is_none());
    }

    #[test]
    fn manual_clock_advances_deterministically() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(9_999);
        assert_eq!(clock.now_ms(), 9_999);
    }
}
