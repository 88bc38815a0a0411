use simcheck_types::ReportId;

/// Errors an analysis operation can surface (spec.md §7).
///
/// Per-file failures (an unreadable submission, a parse failure) are
/// never represented here — they're recorded as warnings on the
/// resulting report and the offending file is dropped, so one bad
/// submission never aborts a whole cohort's analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("only {found} submission file(s) available, at least {required} required to compare")]
    InsufficientFiles { found: usize, required: usize },

    #[error("submission catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("report {0} not found")]
    ReportNotFound(ReportId),

    #[error("no such pair in report {report_id}")]
    PairNotFound { report_id: ReportId },

    #[error("stored report is corrupt: {0}")]
    PersistenceCorrupt(String),

    #[error("analysis exceeded {limit_ms}ms (ran at least {elapsed_ms}ms)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },

    #[error("analysis was cancelled")]
    Cancelled,

    /// A grammar module doesn't exist for the requested language. Never
    /// produced today since `LangTag` is closed to the three supported
    /// grammars, but kept so a future pluggable registry has somewhere
    /// to report into (spec.md §7 treats this as whole-analysis-fatal,
    /// unlike a per-file `TokenizeFailed`).
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A concurrent writer raced this persist attempt (spec.md §7).
    /// The pipeline already retries the persist once internally before
    /// surfacing this; `retries` counts the attempts made (always 2).
    #[error("persistence conflict after {retries} attempt(s)")]
    PersistenceConflict { retries: u32 },
}
