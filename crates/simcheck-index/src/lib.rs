//! # simcheck-index
//!
//! **Tier 1 (Algorithm)**
//!
//! Builds the cross-file inverted index from per-file fingerprint sets
//! (spec.md §4.3): hash -> every `(file, span)` occurrence. This is the
//! join that turns isolated fingerprint sets into candidate evidence of
//! shared material between two or more files.

use std::collections::{BTreeMap, HashSet};

use simcheck_types::{FileId, Fingerprint, Occurrence, SharedFingerprint, Span};

/// Cross-file inverted index over fingerprint hashes.
///
/// A `BTreeMap` backs the hash -> occurrences table so iteration order
/// (and therefore every downstream derived ordering) is deterministic
/// without an explicit sort.
#[derive(Debug, Default)]
pub struct Index {
    occurrences: BTreeMap<u64, Vec<Occurrence>>,
    template_hashes: HashSet<u64>,
    seen: HashSet<(u64, FileId, Span)>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one submission file's fingerprints.
    ///
    /// A `(hash, file, span)` triple already present is skipped rather
    /// than double-counted — guards against a caller accidentally
    /// indexing the same file twice in one run.
    pub fn add_file(&mut self, file_id: FileId, fingerprints: &[Fingerprint]) {
        for fp in fingerprints {
            let key = (fp.hash, file_id, fp.span);
            if !self.seen.insert(key) {
                continue;
            }
            self.occurrences.entry(fp.hash).or_default().push(Occurrence {
                file: file_id,
                span: fp.span,
            });
        }
    }

    /// Register a declared template/boilerplate file's fingerprints.
    ///
    /// The template never becomes a file participants can be paired
    /// against; only its hashes matter, so every one of them is
    /// permanently flagged `ignored` in `shared_fingerprints` output
    /// regardless of how many real submissions also contain it.
    pub fn add_template(&mut self, fingerprints: &[Fingerprint]) {
        for fp in fingerprints {
            self.template_hashes.insert(fp.hash);
        }
    }

    /// Hashes present in at least `min_files` distinct submission
    /// files, each carrying the full occurrence list and an `ignored`
    /// flag (template-sourced, or over `max_files`).
    ///
    /// Results are ordered by ascending hash (stable given the
    /// `BTreeMap` backing), not by any similarity-relevant ordering —
    /// callers that care about order re-sort downstream.
    pub fn shared_fingerprints(&self, min_files: usize, max_files: Option<usize>) -> Vec<SharedFingerprint> {
        self.occurrences
            .iter()
            .filter_map(|(&hash, occs)| {
                let distinct = distinct_file_count(occs);
                if distinct < min_files.max(2) {
                    return None;
                }
                let over_threshold = max_files.is_some_and(|m| distinct > m);
                let ignored = self.template_hashes.contains(&hash) || over_threshold;
                Some(SharedFingerprint {
                    hash,
                    occurrences: occs.clone(),
                    ignored,
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn distinct_hash_count(&self) -> usize {
        self.occurrences.len()
    }
}

fn distinct_file_count(occs: &[Occurrence]) -> usize {
    let mut files: Vec<FileId> = occs.iter().map(|o| o.file).collect();
    files.sort_unstable();
    files.dedup();
    files.len()
}
