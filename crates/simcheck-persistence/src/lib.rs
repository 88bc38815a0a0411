//! # simcheck-persistence
//!
//! **Tier 2 (Orchestration boundary)**
//!
//! Encodes a `simcheck_report::Report` into a stable, submission-id
//! keyed record and back (spec.md §4.6). `FileId`s are only valid for
//! the run that produced them, so every pair is re-keyed here by the
//! submissions' durable `submission_id`, with `sub1_id < sub2_id`
//! canonical ordering re-derived independently of the run's file-id
//! ordering — which is why each fragment carries a `swapped` bit and
//! is re-swapped on the way back out.

use serde::{Deserialize, Serialize};

use simcheck_report::Report;
use simcheck_types::{FileId, Fragment, Span};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("file {0} has no submission id and cannot be persisted")]
    MissingSubmissionId(FileId),
    #[error("files {0} and {1} share submission id {2}, cannot form a canonical pair")]
    DuplicateSubmissionId(FileId, FileId, u64),
    #[error("invalid decimal score: {0:?}")]
    InvalidScore(String),
    #[error("report serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedFragment {
    pub span_for_sub1: Span,
    pub span_for_sub2: Span,
    pub kgram_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedPair {
    pub sub1_id: u64,
    pub sub2_id: u64,
    /// True when `sub1_id`/`sub2_id` order is the reverse of the
    /// originating run's `min_id`/`max_id` file order.
    pub swapped: bool,
    /// 4 fractional digits, e.g. `"0.8421"`.
    pub similarity: String,
    pub fragment_count: usize,
    pub longest_fragment: usize,
    pub overlap: usize,
    pub left_covered: usize,
    pub right_covered: usize,
    pub left_total: usize,
    pub right_total: usize,
    pub is_flagged: bool,
    pub fragments: Vec<PersistedFragment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSummary {
    pub total_files: usize,
    pub total_pairs: usize,
    pub flagged_pairs: usize,
    pub average_similarity: String,
    pub max_similarity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedReport {
    pub assignment_id: u64,
    pub generated_at_ms: u64,
    pub summary: PersistedSummary,
    pub pairs: Vec<PersistedPair>,
    pub warnings: Vec<String>,
}

fn fmt_score(x: f64) -> String {
    format!("{:.4}", x.clamp(0.0, 1.0))
}

fn parse_score(s: &str) -> Result<f64, PersistenceError> {
    s.parse::<f64>().map_err(|_| PersistenceError::InvalidScore(s.to_string()))
}

/// Flatten an in-memory `Report` into its persisted form.
///
/// Every pair's `left`/`right` `FileIdentity` must carry a
/// `submission_id` — a report built purely for an ad-hoc inline
/// analysis (no submission backing) is never meant to reach this
/// function (spec.md §6.3's `AnalyzeInline` never persists).
pub fn encode_report(assignment_id: u64, generated_at_ms: u64, report: &Report) -> Result<PersistedReport, PersistenceError> {
    use simcheck_report::SortBy;

    let mut pairs = Vec::new();
    for rp in report.pairs_sorted_by(SortBy::FileId) {
        let left_sub = rp
            .left
            .submission_id
            .ok_or(PersistenceError::MissingSubmissionId(rp.left.file_id))?;
        let right_sub = rp
            .right
            .submission_id
            .ok_or(PersistenceError::MissingSubmissionId(rp.right.file_id))?;

        let (sub1_id, sub2_id, swapped) = match left_sub.cmp(&right_sub) {
            std::cmp::Ordering::Less => (left_sub, right_sub, false),
            std::cmp::Ordering::Greater => (right_sub, left_sub, true),
            std::cmp::Ordering::Equal => {
                return Err(PersistenceError::DuplicateSubmissionId(rp.left.file_id, rp.right.file_id, left_sub))
            }
        };

        let fragments = report.fragments_for(rp.key).unwrap_or(&[]);
        let persisted_fragments = fragments
            .iter()
            .map(|f| {
                let (span_for_sub1, span_for_sub2) = if swapped {
                    (f.right_span, f.left_span)
                } else {
                    (f.left_span, f.right_span)
                };
                PersistedFragment {
                    span_for_sub1,
                    span_for_sub2,
                    kgram_count: f.kgram_count,
                }
            })
            .collect();

        let (left_covered, right_covered) = if swapped {
            (rp.right_covered, rp.left_covered)
        } else {
            (rp.left_covered, rp.right_covered)
        };
        let (left_total, right_total) = if swapped {
            (rp.right_total, rp.left_total)
        } else {
            (rp.left_total, rp.right_total)
        };

        pairs.push(PersistedPair {
            sub1_id,
            sub2_id,
            swapped,
            similarity: fmt_score(rp.similarity),
            fragment_count: rp.fragment_count,
            longest_fragment: rp.longest_fragment,
            overlap: rp.overlap,
            left_covered,
            right_covered,
            left_total,
            right_total,
            is_flagged: rp.is_flagged,
            fragments: persisted_fragments,
        });
    }

    let s = report.summary();
    Ok(PersistedReport {
        assignment_id,
        generated_at_ms,
        summary: PersistedSummary {
            total_files: s.total_files,
            total_pairs: s.total_pairs,
            flagged_pairs: s.flagged_pairs,
            average_similarity: fmt_score(s.average_similarity),
            max_similarity: fmt_score(s.max_similarity),
        },
        pairs,
        warnings: report.warnings().to_vec(),
    })
}

/// One decoded pair, with fragments already re-swapped back into
/// `left`/`right` = `sub1`/`sub2` order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPair {
    pub sub1_id: u64,
    pub sub2_id: u64,
    pub similarity: f64,
    pub fragment_count: usize,
    pub longest_fragment: usize,
    pub overlap: usize,
    pub left_covered: usize,
    pub right_covered: usize,
    pub left_total: usize,
    pub right_total: usize,
    pub is_flagged: bool,
    pub fragments: Vec<Fragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSummary {
    pub total_files: usize,
    pub total_pairs: usize,
    pub flagged_pairs: usize,
    pub average_similarity: f64,
    pub max_similarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReport {
    pub assignment_id: u64,
    pub generated_at_ms: u64,
    pub summary: DecodedSummary,
    pub pairs: Vec<DecodedPair>,
    pub warnings: Vec<String>,
}

/// Reconstruct spans and scores from a `PersistedReport`, undoing the
/// `swapped` re-keying applied in `encode_report`.
pub fn decode_report(persisted: &PersistedReport) -> Result<DecodedReport, PersistenceError> {
    let mut pairs = Vec::with_capacity(persisted.pairs.len());
    for p in &persisted.pairs {
        let fragments = p
            .fragments
            .iter()
            .map(|f| {
                let (left_span, right_span) = if p.swapped {
                    (f.span_for_sub2, f.span_for_sub1)
                } else {
                    (f.span_for_sub1, f.span_for_sub2)
                };
                Fragment {
                    left_span,
                    right_span,
                    kgram_count: f.kgram_count,
                }
            })
            .collect();

        let (left_covered, right_covered) = if p.swapped {
            (p.right_covered, p.left_covered)
        } else {
            (p.left_covered, p.right_covered)
        };
        let (left_total, right_total) = if p.swapped {
            (p.right_total, p.left_total)
        } else {
            (p.left_total, p.right_total)
        };

        pairs.push(DecodedPair {
            sub1_id: p.sub1_id,
            sub2_id: p.sub2_id,
            similarity: parse_score(&p.similarity)?,
            fragment_count: p.fragment_count,
            longest_fragment: p.longest_fragment,
            overlap: p.overlap,
            left_covered,
            right_covered,
            left_total,
            right_total,
            is_flagged: p.is_flagged,
            fragments,
        });
    }

    Ok(DecodedReport {
        assignment_id: persisted.assignment_id,
        generated_at_ms: persisted.generated_at_ms,
        summary: DecodedSummary {
            total_files: persisted.summary.total_files,
            total_pairs: persisted.summary.total_pairs,
            flagged_pairs: persisted.summary.flagged_pairs,
            average_similarity: parse_score(&persisted.summary.average_similarity)?,
            max_similarity: parse_score(&persisted.summary.max_similarity)?,
        },
        pairs,
        warnings: persisted.warnings.clone(),
    })
}

pub fn serialize_report(report: &PersistedReport) -> Result<Vec<u8>, PersistenceError> {
    Ok(serde_json::to_vec_pretty(report)?)
}

pub fn deserialize_report(bytes: &[u8]) -> Result<PersistedReport, PersistenceError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use simcheck_index::Index;
    use simcheck_report::build_report;
    use simcheck_types::{FileIdentity, Fingerprint};

    fn identity(id: FileId, sub: u64) -> FileIdentity {
        FileIdentity {
            file_id: id,
            path: format!("/f{id}.py"),
            filename: format!("f{id}.py"),
            submission_id: Some(sub),
            student_id: None,
            student_name: None,
            submitted_at: Some(0),
        }
    }

    fn fp(hash: u64, col: u32) -> Fingerprint {
        Fingerprint {
            hash,
            span: Span::new(0, col, 0, col + 1),
        }
    }

    fn sample_report(sub_a: u64, sub_b: u64) -> Report {
        let mut index = Index::new();
        index.add_file(0, &[fp(1, 0)]);
        index.add_file(1, &[fp(1, 5)]);
        let counts = HashMap::from([(0, 3), (1, 3)]);
        let pairs = simcheck_pairs::build_pairs(&index, 2, None, 3, &counts);
        let identities = HashMap::from([(0, identity(0, sub_a)), (1, identity(1, sub_b))]);
        build_report(pairs, &identities, 0.1, None, Vec::new())
    }

    #[test]
    fn round_trips_without_swap_when_submission_order_matches_file_order() {
        let report = sample_report(10, 20);
        let persisted = encode_report(1, 1_000, &report).unwrap();
        assert_eq!(persisted.pairs.len(), 1);
        assert!(!persisted.pairs[0].swapped);
        assert_eq!(persisted.pairs[0].sub1_id, 10);
        assert_eq!(persisted.pairs[0].sub2_id, 20);

        let decoded = decode_report(&persisted).unwrap();
        assert_eq!(decoded.pairs[0].fragments, report.fragments_for(report.pairs_sorted_by(simcheck_report::SortBy::FileId)[0].key).unwrap());
    }

    #[test]
    fn swap_is_tracked_and_reversed_when_submission_order_is_reversed() {
        // file 0 (min_id) belongs to the *higher* submission id here.
        let report = sample_report(99, 5);
        let persisted = encode_report(1, 1_000, &report).unwrap();
        assert!(persisted.pairs[0].swapped);
        assert_eq!(persisted.pairs[0].sub1_id, 5);
        assert_eq!(persisted.pairs[0].sub2_id, 99);

        let decoded = decode_report(&persisted).unwrap();
        let original_fragments = report
            .fragments_for(report.pairs_sorted_by(simcheck_report::SortBy::FileId)[0].key)
            .unwrap();
        assert_eq!(decoded.pairs[0].fragments, original_fragments);
    }

    #[test]
    fn similarity_round_trips_to_four_decimal_places() {
        let report = sample_report(1, 2);
        let persisted = encode_report(1, 1_000, &report).unwrap();
        assert!(persisted.pairs[0].similarity.split('.').nth(1).unwrap().len() == 4);
        let decoded = decode_report(&persisted).unwrap();
        assert!((decoded.pairs[0].similarity - report.pairs_sorted_by(simcheck_report::SortBy::FileId)[0].similarity).abs() < 1e-9);
    }

    #[test]
    fn bytes_round_trip_through_json() {
        let report = sample_report(1, 2);
        let persisted = encode_report(1, 1_000, &report).unwrap();
        let bytes = serialize_report(&persisted).unwrap();
        let back = deserialize_report(&bytes).unwrap();
        assert_eq!(back.pairs.len(), persisted.pairs.len());
        assert_eq!(back.assignment_id, 1);
    }

    #[test]
    fn missing_submission_id_is_rejected() {
        let mut index = Index::new();
        index.add_file(0, &[fp(1, 0)]);
        index.add_file(1, &[fp(1, 5)]);
        let counts = HashMap::from([(0, 3), (1, 3)]);
        let pairs = simcheck_pairs::build_pairs(&index, 2, None, 3, &counts);
        let mut a = identity(0, 1);
        a.submission_id = None;
        let identities = HashMap::from([(0, a), (1, identity(1, 2))]);
        let report = build_report(pairs, &identities, 0.1, None, Vec::new());

        assert!(matches!(
            encode_report(1, 0, &report),
            Err(PersistenceError::MissingSubmissionId(0))
        ));
    }
}
