//! Pipeline configuration (spec.md §6.1).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tokenizer grammar selector. Closed to the three languages spec.md
/// names as the minimum supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LangTag {
    Java,
    Python,
    C,
}

impl fmt::Display for LangTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LangTag::Java => "java",
            LangTag::Python => "python",
            LangTag::C => "c",
        };
        f.write_str(s)
    }
}

impl FromStr for LangTag {
    type Err = UnsupportedLangError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "java" => Ok(LangTag::Java),
            "python" | "py" => Ok(LangTag::Python),
            "c" => Ok(LangTag::C),
            other => Err(UnsupportedLangError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedLangError(pub String);

impl fmt::Display for UnsupportedLangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported language: {}", self.0)
    }
}

impl std::error::Error for UnsupportedLangError {}

/// Auto-analysis coordinator knobs (spec.md §4.7, §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoOptions {
    pub enabled: bool,
    pub debounce_ms: u64,
    pub reconcile_interval_ms: u64,
    pub min_latest_submissions: usize,
}

impl Default for AutoOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 30_000,
            reconcile_interval_ms: 60_000,
            min_latest_submissions: 2,
        }
    }
}

/// Full pipeline configuration. `language` has no sensible default
/// (spec.md §6.1 marks it "required"), so `Options` is built via
/// [`Options::new`] rather than `Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    pub language: LangTag,
    pub kgram_length: u32,
    pub window_size: u32,
    pub min_files_per_hash: usize,
    /// Upper bound on distinct files per hash. `None` resolves to
    /// `max(3, ceil(N/2))` at index-build time, once `N` is known.
    pub max_files_per_hash: Option<usize>,
    pub similarity_threshold: f64,
    /// `None` means unbounded (spec.md default).
    pub max_pairs_returned: Option<usize>,
    pub auto: AutoOptions,
    pub analysis_timeout_ms: u64,
}

impl Options {
    pub fn new(language: LangTag) -> Self {
        Self {
            language,
            kgram_length: 25,
            window_size: 40,
            min_files_per_hash: 2,
            max_files_per_hash: None,
            similarity_threshold: 0.5,
            max_pairs_returned: None,
            auto: AutoOptions::default(),
            analysis_timeout_ms: 300_000,
        }
    }

    pub fn with_kgram_length(mut self, k: u32) -> Self {
        self.kgram_length = k;
        self
    }

    pub fn with_window_size(mut self, w: u32) -> Self {
        self.window_size = w;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_max_files_per_hash(mut self, max_files: usize) -> Self {
        self.max_files_per_hash = Some(max_files);
        self
    }

    /// Resolve `max_files_per_hash` for a cohort of `total_files`
    /// files, applying the `max(3, ceil(N/2))` default (spec.md §6.1).
    pub fn resolved_max_files_per_hash(&self, total_files: usize) -> usize {
        self.max_files_per_hash
            .unwrap_or_else(|| default_max_files_per_hash(total_files))
    }
}

fn default_max_files_per_hash(total_files: usize) -> usize {
    let half = total_files.div_ceil(2);
    half.max(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_files_per_hash_matches_formula() {
        assert_eq!(default_max_files_per_hash(0), 3);
        assert_eq!(default_max_files_per_hash(4), 3);
        assert_eq!(default_max_files_per_hash(5), 3);
        assert_eq!(default_max_files_per_hash(6), 3);
        assert_eq!(default_max_files_per_hash(7), 4);
        assert_eq!(default_max_files_per_hash(20), 10);
    }

    #[test]
    fn options_defaults_match_spec_table() {
        let opts = Options::new(LangTag::Java);
        assert_eq!(opts.kgram_length, 25);
        assert_eq!(opts.window_size, 40);
        assert_eq!(opts.min_files_per_hash, 2);
        assert_eq!(opts.max_files_per_hash, None);
        assert_eq!(opts.similarity_threshold, 0.5);
        assert_eq!(opts.max_pairs_returned, None);
        assert!(opts.auto.enabled);
        assert_eq!(opts.auto.debounce_ms, 30_000);
        assert_eq!(opts.auto.reconcile_interval_ms, 60_000);
        assert_eq!(opts.auto.min_latest_submissions, 2);
        assert_eq!(opts.analysis_timeout_ms, 300_000);
    }

    #[test]
    fn lang_tag_round_trips_through_str() {
        for lang in [LangTag::Java, LangTag::Python, LangTag::C] {
            let parsed: LangTag = lang.to_string().parse().unwrap();
            assert_eq!(parsed, lang);
        }
    }

    #[test]
    fn lang_tag_rejects_unknown() {
        assert!("ruby".parse::<LangTag>().is_err());
    }
}
