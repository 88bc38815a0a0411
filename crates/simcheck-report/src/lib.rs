//! # simcheck-report
//!
//! **Tier 1 (Algorithm)**
//!
//! Assembles the candidate pairs produced by `simcheck-pairs` into the
//! report a caller actually wants: every resolvable candidate pair,
//! ranked, numbered with a dense per-run ID, and marked `is_flagged`
//! where it clears the similarity threshold, alongside cohort summary
//! stats computed over the flagged subset (spec.md §4.5).

use std::collections::HashMap;

use simcheck_pairs::Pair;
use simcheck_types::{FileId, FileIdentity, Fragment, PairKey, ReportSummary};

/// One pair as shown to a caller: identities resolved, similarity and
/// coverage figures flattened out of `Pair::stats()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPair {
    /// Dense, stable-per-run pair id (not persisted across runs).
    pub id: u64,
    pub key: PairKey,
    pub left: FileIdentity,
    pub right: FileIdentity,
    pub similarity: f64,
    pub fragment_count: usize,
    pub longest_fragment: usize,
    pub overlap: usize,
    pub left_covered: usize,
    pub right_covered: usize,
    pub left_total: usize,
    pub right_total: usize,
    /// Whether this pair cleared the run's similarity threshold. A
    /// `Report` retains below-threshold pairs too (spec.md §3), so
    /// callers that only want the flagged subset should filter on
    /// this rather than assume every `ReportPair` is flagged.
    pub is_flagged: bool,
}

/// Ordering a caller can ask `Report::pairs_sorted_by` for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Highest similarity first; ties broken by `PairKey`.
    Similarity,
    /// `(min_id, max_id)` ascending — the order pair ids were assigned in.
    FileId,
}

/// A complete analysis report: the pairs worth a human's attention,
/// any per-file warnings collected along the way, and cohort stats.
pub struct Report {
    pairs: Vec<ReportPair>,
    fragments: HashMap<PairKey, Pair>,
    warnings: Vec<String>,
    summary: ReportSummary,
    dropped_by_cap: usize,
}

impl Report {
    pub fn pairs_sorted_by(&self, order: SortBy) -> Vec<&ReportPair> {
        let mut out: Vec<&ReportPair> = self.pairs.iter().collect();
        match order {
            SortBy::Similarity => out.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.key.cmp(&b.key))
            }),
            SortBy::FileId => out.sort_by_key(|p| p.key),
        }
        out
    }

    /// The `n` highest-similarity pairs.
    pub fn top_pairs(&self, n: usize) -> Vec<&ReportPair> {
        let mut sorted = self.pairs_sorted_by(SortBy::Similarity);
        sorted.truncate(n);
        sorted
    }

    /// Every pair at or above `threshold`, highest similarity first.
    pub fn pairs_above(&self, threshold: f64) -> Vec<&ReportPair> {
        self.pairs_sorted_by(SortBy::Similarity)
            .into_iter()
            .filter(|p| p.similarity >= threshold)
            .collect()
    }

    /// Merged fragments for one pair, or `None` if that pair isn't in
    /// this report (cut by `max_pairs_returned`, or never a candidate
    /// at all).
    pub fn fragments_for(&self, key: PairKey) -> Option<&[Fragment]> {
        self.fragments.get(&key).map(|p| p.fragments())
    }

    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// How many candidate pairs were cut off by `max_pairs_returned`.
    pub fn dropped_by_cap(&self) -> usize {
        self.dropped_by_cap
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Build a `Report` from the candidate pairs `simcheck-pairs` produced.
///
/// Every candidate pair with resolvable identities is retained, below
/// threshold or not, with `is_flagged` recording whether it cleared
/// `threshold` (spec.md §3, §6.2's persisted `is_flagged` column).
/// `max_pairs_returned`, when set, caps the full retained list by
/// highest similarity first; anything cut is recorded in
/// `dropped_by_cap`, never silently lost. Summary stats
/// (`flagged_pairs`/`average_similarity`/`max_similarity`) are always
/// computed over the flagged subset of the pre-cap candidate list, so
/// a low cap never skews them.
pub fn build_report(
    candidate_pairs: Vec<Pair>,
    identities: &HashMap<FileId, FileIdentity>,
    threshold: f64,
    max_pairs_returned: Option<usize>,
    mut warnings: Vec<String>,
) -> Report {
    let total_candidates = candidate_pairs.len();
    let mut fragments: HashMap<PairKey, Pair> = HashMap::new();
    let mut all_pairs: Vec<ReportPair> = Vec::new();

    for pair in candidate_pairs {
        let stats = pair.stats();
        let (Some(left), Some(right)) = (identities.get(&pair.key.min_id), identities.get(&pair.key.max_id)) else {
            warnings.push(format!(
                "pair {}-{} references an unknown file identity, dropped",
                pair.key.min_id, pair.key.max_id
            ));
            continue;
        };
        all_pairs.push(ReportPair {
            id: 0, // assigned below once final ordering is known
            key: pair.key,
            left: left.clone(),
            right: right.clone(),
            similarity: stats.similarity,
            fragment_count: stats.fragment_count,
            longest_fragment: stats.longest,
            overlap: stats.overlap,
            left_covered: stats.left_covered,
            right_covered: stats.right_covered,
            left_total: stats.left_total,
            right_total: stats.right_total,
            is_flagged: stats.similarity >= threshold,
        });
        fragments.insert(pair.key, pair);
    }

    all_pairs.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });

    let flagged_pairs = all_pairs.iter().filter(|p| p.is_flagged).count();
    let average_similarity = if flagged_pairs == 0 {
        0.0
    } else {
        all_pairs.iter().filter(|p| p.is_flagged).map(|p| p.similarity).sum::<f64>() / flagged_pairs as f64
    };
    let max_similarity = all_pairs
        .iter()
        .filter(|p| p.is_flagged)
        .map(|p| p.similarity)
        .fold(0.0_f64, f64::max);

    let mut dropped_by_cap = 0;
    if let Some(max) = max_pairs_returned {
        if all_pairs.len() > max {
            dropped_by_cap = all_pairs.len() - max;
            all_pairs.truncate(max);
            fragments.retain(|k, _| all_pairs.iter().any(|p| &p.key == k));
        }
    }

    for (i, p) in all_pairs.iter_mut().enumerate() {
        p.id = i as u64;
    }

    let summary = ReportSummary {
        total_files: identities.len(),
        total_pairs: total_candidates,
        flagged_pairs,
        average_similarity,
        max_similarity,
    };

    Report {
        pairs: all_pairs,
        fragments,
        warnings,
        summary,
        dropped_by_cap,
    }
}
