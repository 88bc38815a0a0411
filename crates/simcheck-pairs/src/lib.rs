//! # simcheck-pairs
//!
//! **Tier 1 (Algorithm)**
//!
//! Groups shared fingerprints by file pair and merges each pair's raw
//! hash matches into maximal source-order-aligned fragments (spec.md
//! §4.4). A `Pair`'s fragments and similarity score are built lazily —
//! most pairs in a large cohort fall under the similarity threshold
//! and their fragments are never actually needed.

use std::collections::HashMap;
use std::sync::OnceLock;

use simcheck_index::Index;
use simcheck_types::{FileId, Fragment, PairKey, Span};

#[derive(Debug, Clone, Copy)]
struct Contribution {
    left_span: Span,
    right_span: Span,
}

/// Summary statistics derived from a pair's merged fragments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStats {
    pub fragment_count: usize,
    /// Lower-id file's k-grams covered by some fragment (spec.md §4.4):
    /// the sum of `kgram_count` over fragments, counted from the left
    /// span's side.
    pub left_covered: usize,
    /// Higher-id file's k-grams covered by some fragment, counted
    /// independently from the right span's side.
    pub right_covered: usize,
    /// `min(left_covered, right_covered)`.
    pub overlap: usize,
    /// Size of the single largest fragment, in k-grams.
    pub longest: usize,
    /// Total fingerprints emitted for the lower-id file.
    pub left_total: usize,
    /// Total fingerprints emitted for the higher-id file.
    pub right_total: usize,
    /// `(left_covered + right_covered) / (left_total + right_total)`,
    /// clamped to `[0, 1]`; `0.0` when both totals are zero.
    pub similarity: f64,
}

/// One file-pair's raw hash matches plus its lazily-built fragments.
pub struct Pair {
    pub key: PairKey,
    contributions: Vec<Contribution>,
    k: usize,
    left_total: usize,
    right_total: usize,
    cache: OnceLock<(Vec<Fragment>, PairStats)>,
}

impl Pair {
    fn new(key: PairKey, contributions: Vec<Contribution>, k: usize, left_total: usize, right_total: usize) -> Self {
        Self {
            key,
            contributions,
            k,
            left_total,
            right_total,
            cache: OnceLock::new(),
        }
    }

    fn compute(&self) -> &(Vec<Fragment>, PairStats) {
        self.cache.get_or_init(|| {
            let fragments = merge_contributions(self.contributions.clone(), self.k);
            let stats = compute_stats(&fragments, self.left_total, self.right_total);
            (fragments, stats)
        })
    }

    /// Maximal source-order-aligned fragments for this pair, built and
    /// cached on first access.
    pub fn fragments(&self) -> &[Fragment] {
        &self.compute().0
    }

    /// Similarity and coverage statistics for this pair, built and
    /// cached on first access (shares the cache with `fragments`).
    pub fn stats(&self) -> PairStats {
        self.compute().1
    }

    pub fn raw_match_count(&self) -> usize {
        self.contributions.len()
    }
}

/// Build one `Pair` per file combination that shares at least one
/// non-ignored fingerprint (spec.md §4.3-§4.4).
///
/// `file_fingerprint_counts` supplies each file's total emitted
/// fingerprint count, needed to normalize coverage into a similarity
/// fraction (spec.md §4.4); a file missing from the map is treated as
/// having emitted zero fingerprints.
pub fn build_pairs(
    index: &Index,
    min_files: usize,
    max_files: Option<usize>,
    k: u32,
    file_fingerprint_counts: &HashMap<FileId, usize>,
) -> Vec<Pair> {
    let k = k as usize;
    let mut buckets: HashMap<PairKey, Vec<Contribution>> = HashMap::new();

    for sf in index.shared_fingerprints(min_files, max_files) {
        if sf.ignored {
            continue;
        }
        for i in 0..sf.occurrences.len() {
            for j in (i + 1)..sf.occurrences.len() {
                let a = sf.occurrences[i];
                let b = sf.occurrences[j];
                if a.file == b.file {
                    continue;
                }
                let key = PairKey::new(a.file, b.file);
                let (left_span, right_span) = if a.file == key.min_id {
                    (a.span, b.span)
                } else {
                    (b.span, a.span)
                };
                buckets.entry(key).or_default().push(Contribution { left_span, right_span });
            }
        }
    }

    let mut pairs: Vec<Pair> = buckets
        .into_iter()
        .map(|(key, contributions)| {
            let left_total = *file_fingerprint_counts.get(&key.min_id).unwrap_or(&0);
            let right_total = *file_fingerprint_counts.get(&key.max_id).unwrap_or(&0);
            Pair::new(key, contributions, k, left_total, right_total)
        })
        .collect();

    pairs.sort_by_key(|p| (p.key.min_id, p.key.max_id));
    pairs
}

/// Greedily coalesce raw contributions into fragments, then resolve
/// any fragments left overlapping each other.
fn merge_contributions(mut contributions: Vec<Contribution>, k: usize) -> Vec<Fragment> {
    contributions.sort_by_key(|c| c.left_span.start_key());
    let gap = (k as u32).saturating_sub(1);

    let mut fragments: Vec<Fragment> = Vec::new();
    for c in contributions {
        if let Some(last) = fragments.last_mut() {
            if mergeable(&last.left_span, &c.left_span, gap) && mergeable(&last.right_span, &c.right_span, gap) {
                last.left_span = last.left_span.union(&c.left_span);
                last.right_span = last.right_span.union(&c.right_span);
                last.kgram_count += 1;
                continue;
            }
        }
        fragments.push(Fragment {
            left_span: c.left_span,
            right_span: c.right_span,
            kgram_count: 1,
        });
    }

    resolve_overlaps(fragments)
}

/// Two spans are close enough to belong to the same fragment if they
/// overlap, or sit on the same row within `gap` columns of each other.
///
/// Spans carry source rows/columns rather than token indices, so a
/// gap spanning a newline is conservatively treated as non-adjacent —
/// a multi-line match still merges correctly via the overlap case,
/// it just never coalesces across a line break on a gap alone.
fn mergeable(a: &Span, b: &Span, gap: u32) -> bool {
    if b.start_key() <= a.end_key() {
        return true;
    }
    a.end_row == b.start_row && b.start_col.saturating_sub(a.end_col) <= gap
}

fn spans_overlap(a: &Span, b: &Span) -> bool {
    a.start_key() < b.end_key() && b.start_key() < a.end_key()
}

/// Drop the shorter of two overlapping fragments; ties keep whichever
/// was encountered first (i.e. the one with the earlier left start).
fn resolve_overlaps(mut fragments: Vec<Fragment>) -> Vec<Fragment> {
    fragments.sort_by_key(|f| f.left_span.start_key());
    let mut result: Vec<Fragment> = Vec::new();
    for f in fragments {
        if let Some(last) = result.last().copied() {
            if spans_overlap(&last.left_span, &f.left_span) || spans_overlap(&last.right_span, &f.right_span) {
                if f.kgram_count > last.kgram_count {
                    result.pop();
                    result.push(f);
                }
                continue;
            }
        }
        result.push(f);
    }
    result
}

fn compute_stats(fragments: &[Fragment], left_total: usize, right_total: usize) -> PairStats {
    let left_covered: usize = fragments.iter().map(|f| f.kgram_count).sum();
    let right_covered: usize = fragments.iter().map(|f| f.kgram_count).sum();
    let overlap = left_covered.min(right_covered);
    let longest = fragments.iter().map(|f| f.kgram_count).max().unwrap_or(0);
    let denom = left_total + right_total;
    let similarity = if denom == 0 {
        0.0
    } else {
        ((left_covered + right_covered) as f64 / denom as f64).min(1.0)
    };
    PairStats {
        fragment_count: fragments.len(),
        left_covered,
        right_covered,
        overlap,
        longest,
        left_total,
        right_total,
        similarity,
    }
}
