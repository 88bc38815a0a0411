//! # simcheck-types
//!
//! **Tier 0 (Data Contract)**
//!
//! Pure data structures for the similarity pipeline. No I/O, no
//! hashing, no merging — just the shapes every other crate agrees on.

pub mod options;

pub use options::{AutoOptions, LangTag, Options};

use serde::{Deserialize, Serialize};

/// Dense 0-indexed file identifier, stable for the lifetime of one
/// analysis run. Input order fixes the assignment (spec.md §5).
pub type FileId = u32;

/// A 64-bit report identifier assigned by the persistence layer.
pub type ReportId = u64;

/// Source location of a token or a merged run of tokens.
///
/// All coordinates are 0-indexed. The column range is half-open:
/// `[start_col, end_col)`. A `Span` covering `k` consecutive tokens is
/// the union of each token's own span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self {
            start_row,
            start_col,
            end_row,
            end_col,
        }
    }

    /// Ordering key used to sort tokens/fingerprints/fragments by
    /// source position: `(start_row, start_col)`.
    pub fn start_key(&self) -> (u32, u32) {
        (self.start_row, self.start_col)
    }

    pub fn end_key(&self) -> (u32, u32) {
        (self.end_row, self.end_col)
    }

    /// The smallest span containing both `self` and `other`.
    pub fn union(&self, other: &Span) -> Span {
        let (start_row, start_col) = self.start_key().min(other.start_key());
        let (end_row, end_col) = self.end_key().max(other.end_key());
        Span {
            start_row,
            start_col,
            end_row,
            end_col,
        }
    }

    /// True iff `self` starts at or before `other`.
    pub fn starts_before_or_eq(&self, other: &Span) -> bool {
        self.start_key() <= other.start_key()
    }
}

/// A single structural token. Identifiers and literal values are
/// replaced by their category tag (spec.md §4.1) — `lexeme` therefore
/// holds a tag string such as `IDENT` or `INT_LIT`, never the source
/// text of an identifier or literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            lexeme: lexeme.into(),
            span,
        }
    }
}

/// Identity of one file entering an analysis run. Owned by the
/// pipeline for the duration of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdentity {
    pub file_id: FileId,
    pub path: String,
    pub filename: String,
    pub submission_id: Option<u64>,
    pub student_id: Option<u64>,
    pub student_name: Option<String>,
    /// Wall-clock time the submission was made, milliseconds since the
    /// epoch. `None` for an ad-hoc file with no submission behind it
    /// (e.g. `simcheck-cli`'s direct-file-argument mode).
    pub submitted_at: Option<u64>,
}

/// A tokenized source file: identity, original bytes (needed for
/// viewer slicing) and the ordered token stream.
///
/// Invariant: `tokens` are in source order; spans are non-decreasing
/// by `(start_row, start_col)`.
#[derive(Debug, Clone)]
pub struct TokenizedFile {
    pub identity: FileIdentity,
    pub content: String,
    pub tokens: Vec<Token>,
}

impl TokenizedFile {
    pub fn new(identity: FileIdentity, content: String, tokens: Vec<Token>) -> Self {
        debug_assert!(
            tokens.windows(2).all(|w| w[0].span.start_key() <= w[1].span.start_key()),
            "tokens must be in non-decreasing source order"
        );
        Self {
            identity,
            content,
            tokens,
        }
    }

    pub fn file_id(&self) -> FileId {
        self.identity.file_id
    }
}

/// A 64-bit hash over a k-gram of token tags, paired with the span the
/// k-gram covers. Fingerprints are not unique within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: u64,
    pub span: Span,
}

/// One occurrence of a shared hash in a specific file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub file: FileId,
    pub span: Span,
}

/// A fingerprint hash present in two or more distinct files.
///
/// Invariant: `occurrences` touches at least two distinct `file`
/// values (otherwise the hash would not have been promoted to
/// "shared" by the index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedFingerprint {
    pub hash: u64,
    pub occurrences: Vec<Occurrence>,
    /// Set when this hash originated from a declared template file or
    /// exceeded the max-files-per-hash threshold.
    pub ignored: bool,
}

impl SharedFingerprint {
    pub fn distinct_files(&self) -> usize {
        let mut files: Vec<FileId> = self.occurrences.iter().map(|o| o.file).collect();
        files.sort_unstable();
        files.dedup();
        files.len()
    }
}

/// A maximal source-order-aligned run of shared fingerprints between
/// one specific pair of files.
///
/// Invariant: within a pair, fragments are pairwise non-overlapping on
/// both sides after merging, and sorted by `left_span`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub left_span: Span,
    pub right_span: Span,
    pub kgram_count: usize,
}

/// An unordered pair of files with canonical ordering `min_id < max_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub min_id: FileId,
    pub max_id: FileId,
}

impl PairKey {
    /// Build a canonical key from two file ids in any order.
    ///
    /// # Panics
    /// Panics if `a == b`: a pair always relates two distinct files.
    pub fn new(a: FileId, b: FileId) -> Self {
        assert_ne!(a, b, "a pair key relates two distinct files");
        if a < b {
            PairKey { min_id: a, max_id: b }
        } else {
            PairKey { min_id: b, max_id: a }
        }
    }
}

/// Summary statistics over one analysis report (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_files: usize,
    pub total_pairs: usize,
    pub flagged_pairs: usize,
    pub average_similarity: f64,
    pub max_similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_canonicalizes_order() {
        assert_eq!(PairKey::new(3, 1), PairKey::new(1, 3));
        let k = PairKey::new(5, 2);
        assert_eq!(k.min_id, 2);
        assert_eq!(k.max_id, 5);
    }

    #[test]
    #[should_panic]
    fn pair_key_rejects_self_pair() {
        PairKey::new(4, 4);
    }

    #[test]
    fn span_union_widens_to_cover_both() {
        let a = Span::new(0, 0, 0, 5);
        let b = Span::new(0, 3, 1, 2);
        let u = a.union(&b);
        assert_eq!(u, Span::new(0, 0, 1, 2));
    }
}
