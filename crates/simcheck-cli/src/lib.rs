//! # simcheck-cli
//!
//! **Tier 3 (CLI & configuration)**
//!
//! The offline reproduction CLI from spec.md §6.4. Parses arguments,
//! loads `simcheck.toml`, wires the in-memory port adapters to
//! `simcheck-pipeline`'s `analyze_inline`, and prints the resulting
//! report. This crate should contain minimal business logic — the
//! pipeline already owns the algorithm.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use simcheck_pipeline::{AnalysisError, Cancellation, Pipeline};
use simcheck_ports::{InMemoryFileStore, InMemoryReportStore, InMemorySubmissionCatalog, SystemClock};
use simcheck_types::{FileId, FileIdentity, LangTag, Options};

pub use config::{load_config, FileConfig};

/// Exit codes spec.md §6.4 assigns this binary.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_BAD_ARGS: i32 = 2;
pub const EXIT_TOKENIZE_FAILED_ALL: i32 = 3;
pub const EXIT_TIMEOUT: i32 = 4;
const EXIT_INTERNAL_ERROR: i32 = 1;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliLang {
    Java,
    Python,
    C,
}

impl From<CliLang> for LangTag {
    fn from(value: CliLang) -> Self {
        match value {
            CliLang::Java => LangTag::Java,
            CliLang::Python => LangTag::Python,
            CliLang::C => LangTag::C,
        }
    }
}

/// `simcheck analyze --lang {java|python|c} [-k 25] [-w 40] [--template FILE] [--threshold 0.5] FILE...`
#[derive(Parser, Debug)]
#[command(name = "simcheck", version, about, long_about = None)]
pub struct Cli {
    /// Tokenizer grammar to parse every input file with.
    #[arg(long, value_enum)]
    pub lang: CliLang,

    /// K-gram length for fingerprinting. Defaults to 25.
    #[arg(short = 'k', long = "kgram-length")]
    pub kgram_length: Option<u32>,

    /// Winnowing window size. Defaults to 40.
    #[arg(short = 'w', long = "window-size")]
    pub window_size: Option<u32>,

    /// Boilerplate file whose fingerprints are filtered out of every match.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Minimum similarity a pair must reach to appear in the report.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Explicit path to a `simcheck.toml`. Errors if it doesn't exist.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Source files to compare pairwise. At least two are required.
    #[arg(value_name = "FILE", required = true, num_args = 2..)]
    pub files: Vec<PathBuf>,
}

/// Merge a `FileConfig` (lowest precedence) under CLI flags (highest
/// precedence) onto `Options::new`'s defaults.
fn build_options(cli: &Cli, file: &FileConfig) -> Options {
    let mut options = Options::new(cli.lang.into());

    if let Some(v) = file.kgram_length {
        options.kgram_length = v;
    }
    if let Some(v) = file.window_size {
        options.window_size = v;
    }
    if let Some(v) = file.min_files_per_hash {
        options.min_files_per_hash = v;
    }
    if let Some(v) = file.max_files_per_hash {
        options.max_files_per_hash = Some(v);
    }
    if let Some(v) = file.similarity_threshold {
        options.similarity_threshold = v;
    }
    if let Some(v) = file.max_pairs_returned {
        options.max_pairs_returned = Some(v);
    }
    if let Some(v) = file.analysis_timeout_ms {
        options.analysis_timeout_ms = v;
    }

    if let Some(v) = cli.kgram_length {
        options.kgram_length = v;
    }
    if let Some(v) = cli.window_size {
        options.window_size = v;
    }
    if let Some(v) = cli.threshold {
        options.similarity_threshold = v;
    }

    options
}

fn load_files_into_store(paths: &[PathBuf]) -> Result<(Arc<InMemoryFileStore>, Vec<FileIdentity>)> {
    let store = Arc::new(InMemoryFileStore::new());
    let mut identities = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let path_str = path.display().to_string();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_str.clone());
        store.put(path_str.clone(), bytes);
        identities.push(FileIdentity {
            file_id: i as FileId,
            path: path_str,
            filename,
            submission_id: None,
            student_id: None,
            student_name: None,
            submitted_at: None,
        });
    }
    Ok((store, identities))
}

fn print_report(report: &simcheck_report::Report) {
    let summary = report.summary();
    println!(
        "{} files, {} candidate pair(s), {} flagged (avg similarity {:.4}, max {:.4})",
        summary.total_files, summary.total_pairs, summary.flagged_pairs, summary.average_similarity, summary.max_similarity
    );
    if report.dropped_by_cap() > 0 {
        println!("({} additional pair(s) dropped by max_pairs_returned)", report.dropped_by_cap());
    }
    for pair in report.pairs_sorted_by(simcheck_report::SortBy::Similarity) {
        if !pair.is_flagged {
            continue;
        }
        println!(
            "  #{:<3} {:.4}  {} <-> {}  ({} fragment(s), longest {})",
            pair.id, pair.similarity, pair.left.filename, pair.right.filename, pair.fragment_count, pair.longest_fragment
        );
    }
    for warning in report.warnings() {
        eprintln!("warning: {warning}");
    }
}

/// Run the CLI end to end and return the process exit code; never
/// panics on user-facing failures, only on internal invariant breaks.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let file_config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return EXIT_BAD_ARGS;
        }
    };
    let options = build_options(&cli, &file_config);

    let (store, identities) = match load_files_into_store(&cli.files) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return EXIT_BAD_ARGS;
        }
    };
    let template_bytes = match cli.template.as_deref() {
        Some(path) => match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                eprintln!("Error: reading template {}: {e}", path.display());
                return EXIT_BAD_ARGS;
            }
        },
        None => None,
    };

    let catalog = Arc::new(InMemorySubmissionCatalog::new());
    let report_store = Arc::new(InMemoryReportStore::new());
    let clock = Arc::new(SystemClock);
    let pipeline = Pipeline::new(store, catalog, report_store, clock);
    let cancellation = Cancellation::new();

    match pipeline.analyze_inline(identities, template_bytes, &options, &cancellation).await {
        Ok(report) => {
            print_report(&report);
            EXIT_SUCCESS
        }
        Err(AnalysisError::InsufficientFiles { found, required }) => {
            eprintln!("Error: only {found} of {required} required file(s) could be tokenized and read");
            EXIT_TOKENIZE_FAILED_ALL
        }
        Err(AnalysisError::Timeout { elapsed_ms, limit_ms }) => {
            eprintln!("Error: analysis timed out after {elapsed_ms}ms (limit {limit_ms}ms)");
            EXIT_TIMEOUT
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_INTERNAL_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_win_over_file_config() {
        let cli = Cli {
            lang: CliLang::Python,
            kgram_length: Some(5),
            window_size: None,
            template: None,
            threshold: None,
            config: None,
            files: vec![],
        };
        let file = FileConfig {
            kgram_length: Some(99),
            window_size: Some(7),
            similarity_threshold: Some(0.9),
            ..Default::default()
        };
        let options = build_options(&cli, &file);
        assert_eq!(options.kgram_length, 5);
        assert_eq!(options.window_size, 7);
        assert_eq!(options.similarity_threshold, 0.9);
    }

    #[test]
    fn defaults_apply_when_nothing_overrides_them() {
        let cli = Cli {
            lang: CliLang::Java,
            kgram_length: None,
            window_size: None,
            template: None,
            threshold: None,
            config: None,
            files: vec![],
        };
        let options = build_options(&cli, &FileConfig::default());
        let defaults = Options::new(LangTag::Java);
        assert_eq!(options.kgram_length, defaults.kgram_length);
        assert_eq!(options.window_size, defaults.window_size);
        assert_eq!(options.similarity_threshold, defaults.similarity_threshold);
    }
}
