//! # simcheck-pipeline
//!
//! **Tier 2 (Orchestration)**
//!
//! Wires the Tier 1 algorithm crates into the operations a caller
//! actually invokes (spec.md §6.3): analyzing an assignment's latest
//! submissions, an ad-hoc inline analysis, and reading back a stored
//! report. Depends only on `simcheck-ports` traits — never a concrete
//! store, filesystem, or database.

mod cancellation;
mod error;

pub use cancellation::Cancellation;
pub use error::AnalysisError;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use simcheck_ports::{Clock, FileStore, ReportStore, SubmissionCatalog};
use simcheck_types::{FileId, FileIdentity, Fingerprint, Options, ReportId, TokenizedFile};

struct TokenizedWithFingerprints {
    tokenized: TokenizedFile,
    fingerprints: Vec<Fingerprint>,
}

/// A per-file failure (drop + warn) versus a whole-analysis failure
/// (abort immediately) — spec.md §7 treats `UnsupportedLanguage`
/// differently from every other tokenize-time error.
enum FileTaskError {
    Warning(FileIdentity, String),
    UnsupportedLanguage(String),
}

async fn tokenize_and_fingerprint_one(
    file_store: Arc<dyn FileStore>,
    identity: FileIdentity,
    language: simcheck_types::LangTag,
    k: u32,
    w: u32,
) -> Result<TokenizedWithFingerprints, FileTaskError> {
    let bytes = file_store
        .read_file(&identity.path)
        .await
        .map_err(|e| FileTaskError::Warning(identity.clone(), e.to_string()))?;
    let tokens = simcheck_tokenizer::tokenize(&bytes, language).map_err(|e| {
        if e.kind == simcheck_tokenizer::TokenizeErrorKind::UnsupportedLanguage {
            FileTaskError::UnsupportedLanguage(e.to_string())
        } else {
            FileTaskError::Warning(identity.clone(), e.to_string())
        }
    })?;
    let fingerprints = simcheck_fingerprint::fingerprint(&tokens, k, w);
    let content = String::from_utf8(bytes).unwrap_or_default();
    Ok(TokenizedWithFingerprints {
        tokenized: TokenizedFile::new(identity, content, tokens),
        fingerprints,
    })
}

/// End-to-end analysis orchestration over the four port traits.
pub struct Pipeline {
    file_store: Arc<dyn FileStore>,
    catalog: Arc<dyn SubmissionCatalog>,
    report_store: Arc<dyn ReportStore>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    pub fn new(
        file_store: Arc<dyn FileStore>,
        catalog: Arc<dyn SubmissionCatalog>,
        report_store: Arc<dyn ReportStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            file_store,
            catalog,
            report_store,
            clock,
        }
    }

    /// Tokenize, fingerprint, index, pair, and score `files` (and an
    /// optional template) without touching the catalog or a store.
    /// A file that fails to read or parse is dropped with a warning
    /// rather than aborting the whole run (spec.md §7).
    async fn run_analysis(
        &self,
        mut files: Vec<FileIdentity>,
        template_bytes: Option<Vec<u8>>,
        options: &Options,
    ) -> Result<simcheck_report::Report, AnalysisError> {
        if files.len() < 2 {
            return Err(AnalysisError::InsufficientFiles {
                found: files.len(),
                required: 2,
            });
        }
        files.sort_by_key(|f| f.file_id);

        let mut join_set = tokio::task::JoinSet::new();
        for identity in files {
            let store = self.file_store.clone();
            let language = options.language;
            let k = options.kgram_length;
            let w = options.window_size;
            join_set.spawn(async move { tokenize_and_fingerprint_one(store, identity, language, k, w).await });
        }

        let mut index = simcheck_index::Index::new();
        let mut identities: HashMap<FileId, FileIdentity> = HashMap::new();
        let mut fingerprint_counts: HashMap<FileId, usize> = HashMap::new();
        let mut warnings: Vec<String> = Vec::new();

        // Tasks run concurrently; this loop is the only place the
        // index is touched, so inserting into it needs no lock.
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    let file_id = outcome.tokenized.file_id();
                    index.add_file(file_id, &outcome.fingerprints);
                    fingerprint_counts.insert(file_id, outcome.fingerprints.len());
                    identities.insert(file_id, outcome.tokenized.identity.clone());
                }
                Ok(Err(FileTaskError::Warning(identity, reason))) => {
                    tracing::warn!(file = %identity.path, %reason, "dropping file from analysis");
                    warnings.push(format!("{}: {}", identity.path, reason));
                }
                Ok(Err(FileTaskError::UnsupportedLanguage(reason))) => {
                    // Whole-analysis failure (spec.md §7): no grammar
                    // exists at all, so partial results are meaningless.
                    join_set.abort_all();
                    return Err(AnalysisError::UnsupportedLanguage(reason));
                }
                Err(join_err) => {
                    tracing::warn!(%join_err, "analysis subtask panicked");
                    warnings.push(format!("task join failure: {join_err}"));
                }
            }
        }

        if let Some(bytes) = template_bytes {
            match simcheck_tokenizer::tokenize(&bytes, options.language) {
                Ok(tokens) => {
                    let fps = simcheck_fingerprint::fingerprint(&tokens, options.kgram_length, options.window_size);
                    index.add_template(&fps);
                }
                Err(e) => warnings.push(format!("template file: {e}")),
            }
        }

        if identities.len() < 2 {
            return Err(AnalysisError::InsufficientFiles {
                found: identities.len(),
                required: 2,
            });
        }

        let max_files = options.resolved_max_files_per_hash(identities.len());
        let pairs = simcheck_pairs::build_pairs(
            &index,
            options.min_files_per_hash,
            Some(max_files),
            options.kgram_length,
            &fingerprint_counts,
        );
        Ok(simcheck_report::build_report(
            pairs,
            &identities,
            options.similarity_threshold,
            options.max_pairs_returned,
            warnings,
        ))
    }

    async fn with_timeout_and_cancellation<T, F>(
        &self,
        options: &Options,
        cancellation: &Cancellation,
        fut: F,
    ) -> Result<T, AnalysisError>
    where
        F: std::future::Future<Output = Result<T, AnalysisError>>,
    {
        let start = self.clock.now_ms();
        let limit_ms = options.analysis_timeout_ms.max(1);
        tokio::select! {
            res = tokio::time::timeout(Duration::from_millis(limit_ms), fut) => {
                match res {
                    Ok(inner) => inner,
                    Err(_) => Err(AnalysisError::Timeout {
                        elapsed_ms: self.clock.now_ms().saturating_sub(start),
                        limit_ms,
                    }),
                }
            }
            _ = cancellation.cancelled() => Err(AnalysisError::Cancelled),
        }
    }

    /// Analyze an assignment's latest submissions end to end and
    /// persist the result, returning the new report's id.
    pub async fn analyze_assignment(
        &self,
        assignment_id: u64,
        options: &Options,
        cancellation: &Cancellation,
    ) -> Result<ReportId, AnalysisError> {
        self.with_timeout_and_cancellation(options, cancellation, async {
            let files = self
                .catalog
                .latest_submissions(assignment_id)
                .await
                .map_err(|e| AnalysisError::CatalogUnavailable(e.to_string()))?;
            let report = self.run_analysis(files, None, options).await?;
            let persisted = simcheck_persistence::encode_report(assignment_id, self.clock.now_ms(), &report)
                .map_err(|e| AnalysisError::PersistenceCorrupt(e.to_string()))?;
            let bytes = simcheck_persistence::serialize_report(&persisted)
                .map_err(|e| AnalysisError::PersistenceCorrupt(e.to_string()))?;
            self.persist_with_retry(assignment_id, bytes).await
        })
        .await
    }

    /// Persists a report, retrying once on a [`simcheck_ports::ReportStoreError::Conflict`]
    /// before giving up (spec.md §7: `PersistenceConflict` is retryable).
    async fn persist_with_retry(&self, assignment_id: u64, bytes: Vec<u8>) -> Result<ReportId, AnalysisError> {
        match self.report_store.persist(assignment_id, bytes.clone()).await {
            Ok(id) => Ok(id),
            Err(e) if e.downcast_ref::<simcheck_ports::ReportStoreError>().is_some() => {
                tracing::warn!(assignment_id, "persist conflict, retrying once");
                self.report_store.persist(assignment_id, bytes).await.map_err(|e| {
                    if e.downcast_ref::<simcheck_ports::ReportStoreError>().is_some() {
                        AnalysisError::PersistenceConflict { retries: 2 }
                    } else {
                        AnalysisError::StorageUnavailable(e.to_string())
                    }
                })
            }
            Err(e) => Err(AnalysisError::StorageUnavailable(e.to_string())),
        }
    }

    /// Run the same pipeline over caller-supplied files without a
    /// catalog lookup or persistence — used for one-off local runs
    /// (e.g. `simcheck-cli`'s `analyze FILE...`).
    pub async fn analyze_inline(
        &self,
        files: Vec<FileIdentity>,
        template_bytes: Option<Vec<u8>>,
        options: &Options,
        cancellation: &Cancellation,
    ) -> Result<simcheck_report::Report, AnalysisError> {
        self.with_timeout_and_cancellation(options, cancellation, self.run_analysis(files, template_bytes, options))
            .await
    }

    /// Entry point the coordinator calls; identical to
    /// `analyze_assignment` but logged distinctly so auto-triggered
    /// runs are distinguishable from manually requested ones.
    pub async fn trigger_auto_analysis(
        &self,
        assignment_id: u64,
        options: &Options,
        cancellation: &Cancellation,
    ) -> Result<ReportId, AnalysisError> {
        tracing::info!(assignment_id, "auto-analysis triggered");
        self.analyze_assignment(assignment_id, options, cancellation).await
    }

    pub async fn get_report(&self, report_id: ReportId) -> Result<simcheck_persistence::DecodedReport, AnalysisError> {
        let bytes = self
            .report_store
            .load(report_id)
            .await
            .map_err(|e| AnalysisError::StorageUnavailable(e.to_string()))?
            .ok_or(AnalysisError::ReportNotFound(report_id))?;
        let persisted =
            simcheck_persistence::deserialize_report(&bytes).map_err(|e| AnalysisError::PersistenceCorrupt(e.to_string()))?;
        simcheck_persistence::decode_report(&persisted).map_err(|e| AnalysisError::PersistenceCorrupt(e.to_string()))
    }

    pub async fn get_pair_details(
        &self,
        report_id: ReportId,
        sub1_id: u64,
        sub2_id: u64,
    ) -> Result<simcheck_persistence::DecodedPair, AnalysisError> {
        let (lo, hi) = if sub1_id <= sub2_id { (sub1_id, sub2_id) } else { (sub2_id, sub1_id) };
        let report = self.get_report(report_id).await?;
        report
            .pairs
            .into_iter()
            .find(|p| p.sub1_id == lo && p.sub2_id == hi)
            .ok_or(AnalysisError::PairNotFound { report_id })
    }

    pub async fn delete_report(&self, report_id: ReportId) -> Result<(), AnalysisError> {
        self.report_store
            .delete(report_id)
            .await
            .map_err(|e| AnalysisError::StorageUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcheck_ports::{InMemoryFileStore, InMemoryReportStore, InMemorySubmissionCatalog, ManualClock};
    use simcheck_types::LangTag;

    fn identity(id: FileId, path: &str, sub: u64) -> FileIdentity {
        FileIdentity {
            file_id: id,
            path: path.to_string(),
            filename: path.to_string(),
            submission_id: Some(sub),
            student_id: None,
            student_name: None,
            submitted_at: Some(0),
        }
    }

    fn wire() -> (Pipeline, Arc<InMemoryFileStore>, Arc<InMemorySubmissionCatalog>, Arc<InMemoryReportStore>) {
        let files = Arc::new(InMemoryFileStore::new());
        let catalog = Arc::new(InMemorySubmissionCatalog::new());
        let store = Arc::new(InMemoryReportStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let pipeline = Pipeline::new(files.clone(), catalog.clone(), store.clone(), clock);
        (pipeline, files, catalog, store)
    }

    #[tokio::test]
    async fn identical_files_analyze_to_a_high_similarity_pair() {
        let (pipeline, files, catalog, _store) = wire();
        let src = b"def add(a, b):\n    return a + b\n".to_vec();
        files.put("/a.py", src.clone());
        files.put("/b.py", src.clone());
        catalog.set_submissions(1, vec![identity(0, "/a.py", 10), identity(1, "/b.py", 20)]);

        let options = Options::new(LangTag::Python).with_kgram_length(3).with_window_size(2);
        let cancel = Cancellation::new();
        let report_id = pipeline.analyze_assignment(1, &options, &cancel).await.unwrap();

        let decoded = pipeline.get_report(report_id).await.unwrap();
        assert_eq!(decoded.summary.flagged_pairs, 1);
        assert!(decoded.pairs[0].similarity > 0.5);
    }

    #[tokio::test]
    async fn fewer_than_two_submissions_is_insufficient_files() {
        let (pipeline, files, catalog, _store) = wire();
        files.put("/a.py", b"x = 1\n".to_vec());
        catalog.set_submissions(1, vec![identity(0, "/a.py", 1)]);

        let options = Options::new(LangTag::Python);
        let cancel = Cancellation::new();
        let err = pipeline.analyze_assignment(1, &options, &cancel).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientFiles { found: 1, required: 2 }));
    }

    #[tokio::test]
    async fn unreadable_file_is_dropped_with_a_warning_not_a_hard_error() {
        let (pipeline, files, catalog, _store) = wire();
        files.put("/a.py", b"x = 1\ny = 2\n".to_vec());
        catalog.set_submissions(
            1,
            vec![identity(0, "/a.py", 1), identity(1, "/missing.py", 2)],
        );

        let options = Options::new(LangTag::Python);
        let cancel = Cancellation::new();
        let err = pipeline.analyze_assignment(1, &options, &cancel).await.unwrap_err();
        // Only one file survives, so this is still InsufficientFiles,
        // not a storage/catalog-level failure.
        assert!(matches!(err, AnalysisError::InsufficientFiles { found: 1, .. }));
    }

    #[tokio::test]
    async fn cancellation_wins_over_a_slow_run() {
        let (pipeline, files, catalog, _store) = wire();
        files.put("/a.py", b"x = 1\n".to_vec());
        files.put("/b.py", b"x = 1\n".to_vec());
        catalog.set_submissions(1, vec![identity(0, "/a.py", 1), identity(1, "/b.py", 2)]);

        let mut options = Options::new(LangTag::Python);
        options.analysis_timeout_ms = 60_000;
        let cancel = Cancellation::new();
        cancel.cancel();
        let err = pipeline.analyze_assignment(1, &options, &cancel).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }

    #[tokio::test]
    async fn get_pair_details_accepts_submission_ids_in_either_order() {
        let (pipeline, files, catalog, _store) = wire();
        let src = b"for i in range(10):\n    print(i)\n".to_vec();
        files.put("/a.py", src.clone());
        files.put("/b.py", src.clone());
        catalog.set_submissions(1, vec![identity(0, "/a.py", 10), identity(1, "/b.py", 20)]);

        let options = Options::new(LangTag::Python).with_kgram_length(3).with_window_size(2);
        let cancel = Cancellation::new();
        let report_id = pipeline.analyze_assignment(1, &options, &cancel).await.unwrap();

        let a = pipeline.get_pair_details(report_id, 10, 20).await.unwrap();
        let b = pipeline.get_pair_details(report_id, 20, 10).await.unwrap();
        assert_eq!(a, b);
    }

    /// A `ReportStore` that conflicts on its first `persist` call for a
    /// given assignment and succeeds on every later one, so the
    /// pipeline's retry-once behavior is exercisable without giving
    /// `InMemoryReportStore` a conflict path of its own.
    struct ConflictOnceStore {
        inner: Arc<InMemoryReportStore>,
        failed_once: std::sync::atomic::AtomicBool,
        always_conflict: bool,
    }

    impl ConflictOnceStore {
        fn new(always_conflict: bool) -> Self {
            Self {
                inner: Arc::new(InMemoryReportStore::new()),
                failed_once: std::sync::atomic::AtomicBool::new(false),
                always_conflict,
            }
        }
    }

    #[async_trait::async_trait]
    impl ReportStore for ConflictOnceStore {
        async fn persist(&self, assignment_id: u64, bytes: Vec<u8>) -> anyhow::Result<ReportId> {
            if self.always_conflict || !self.failed_once.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(simcheck_ports::ReportStoreError::Conflict.into());
            }
            self.inner.persist(assignment_id, bytes).await
        }

        async fn load(&self, report_id: ReportId) -> anyhow::Result<Option<Vec<u8>>> {
            self.inner.load(report_id).await
        }

        async fn latest_for_assignment(&self, assignment_id: u64) -> anyhow::Result<Option<(ReportId, Vec<u8>)>> {
            self.inner.latest_for_assignment(assignment_id).await
        }

        async fn delete(&self, report_id: ReportId) -> anyhow::Result<()> {
            self.inner.delete(report_id).await
        }
    }

    #[tokio::test]
    async fn a_single_persist_conflict_is_retried_and_succeeds() {
        let files = Arc::new(InMemoryFileStore::new());
        let catalog = Arc::new(InMemorySubmissionCatalog::new());
        let store = Arc::new(ConflictOnceStore::new(false));
        let clock = Arc::new(ManualClock::new(0));
        let pipeline = Pipeline::new(files.clone(), catalog.clone(), store, clock);

        let src = b"x = 1\ny = 2\n".to_vec();
        files.put("/a.py", src.clone());
        files.put("/b.py", src.clone());
        catalog.set_submissions(1, vec![identity(0, "/a.py", 1), identity(1, "/b.py", 2)]);

        let options = Options::new(LangTag::Python).with_kgram_length(2).with_window_size(1);
        let cancel = Cancellation::new();
        let report_id = pipeline.analyze_assignment(1, &options, &cancel).await.unwrap();
        assert_eq!(report_id, 0);
    }

    #[tokio::test]
    async fn a_persist_conflict_on_every_attempt_surfaces_as_persistence_conflict() {
        let files = Arc::new(InMemoryFileStore::new());
        let catalog = Arc::new(InMemorySubmissionCatalog::new());
        let store = Arc::new(ConflictOnceStore::new(true));
        let clock = Arc::new(ManualClock::new(0));
        let pipeline = Pipeline::new(files.clone(), catalog.clone(), store, clock);

        let src = b"x = 1\ny = 2\n".to_vec();
        files.put("/a.py", src.clone());
        files.put("/b.py", src.clone());
        catalog.set_submissions(1, vec![identity(0, "/a.py", 1), identity(1, "/b.py", 2)]);

        let options = Options::new(LangTag::Python).with_kgram_length(2).with_window_size(1);
        let cancel = Cancellation::new();
        let err = pipeline.analyze_assignment(1, &options, &cancel).await.unwrap_err();
        assert!(matches!(err, AnalysisError::PersistenceConflict { retries: 2 }));
    }

    #[tokio::test]
    async fn delete_report_makes_it_unfindable() {
        let (pipeline, files, catalog, _store) = wire();
        let src = b"x = 1\ny = 2\nz = 3\n".to_vec();
        files.put("/a.py", src.clone());
        files.put("/b.py", src.clone());
        catalog.set_submissions(1, vec![identity(0, "/a.py", 1), identity(1, "/b.py", 2)]);

        let options = Options::new(LangTag::Python).with_kgram_length(3).with_window_size(2);
        let cancel = Cancellation::new();
        let report_id = pipeline.analyze_assignment(1, &options, &cancel).await.unwrap();
        pipeline.delete_report(report_id).await.unwrap();

        let err = pipeline.get_report(report_id).await.unwrap_err();
        assert!(matches!(err, AnalysisError::ReportNotFound(_)));
    }
}
