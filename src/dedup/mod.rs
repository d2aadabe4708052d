//! Publication deduplication: DOI first, then exact normalized title, then
//! a fuzzy title scan. Admitted publications are never mutated.

use serde::Serialize;
use std::collections::BTreeMap;
use strsim::normalized_damerau_levenshtein;

use crate::entities::Publication;

pub const DEFAULT_TITLE_THRESHOLD: f64 = 0.95;

/// Why an incoming publication was judged a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    Doi,
    TitleExact,
    TitleFuzzy,
}

/// Outcome of a dedup check.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    Admit,
    Duplicate {
        existing_id: String,
        reason: DuplicateReason,
        /// Damerau-Levenshtein ratio for fuzzy title hits, 1.0 otherwise.
        similarity: f64,
    },
}

/// Keeps one admitted publication per DOI and per normalized title. The
/// title map is a `BTreeMap` so the fuzzy scan visits keys in a stable
/// order and the first hit is reproducible.
#[derive(Debug)]
pub struct PublicationDeduplicator {
    by_doi: BTreeMap<String, String>,
    by_normalized_title: BTreeMap<String, String>,
    title_threshold: f64,
}

impl PublicationDeduplicator {
    pub fn new(title_threshold: f64) -> Self {
        Self {
            by_doi: BTreeMap::new(),
            by_normalized_title: BTreeMap::new(),
            title_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.by_doi.len().max(self.by_normalized_title.len())
    }

    pub fn is_empty(&self) -> bool {
        self.by_doi.is_empty() && self.by_normalized_title.is_empty()
    }

    /// Checks without mutating. Call `admit` afterwards for publications
    /// this returns `Admit` for.
    pub fn check(&self, publication: &Publication) -> DedupOutcome {
        if let Some(doi) = publication.doi.as_deref() {
            if let Some(existing_id) = self.by_doi.get(doi) {
                return DedupOutcome::Duplicate {
                    existing_id: existing_id.clone(),
                    reason: DuplicateReason::Doi,
                    similarity: 1.0,
                };
            }
        }
        let title = publication.normalized_title.as_str();
        if title.is_empty() {
            return DedupOutcome::Admit;
        }
        if let Some(existing_id) = self.by_normalized_title.get(title) {
            return DedupOutcome::Duplicate {
                existing_id: existing_id.clone(),
                reason: DuplicateReason::TitleExact,
                similarity: 1.0,
            };
        }
        for (known_title, existing_id) in &self.by_normalized_title {
            let similarity = normalized_damerau_levenshtein(title, known_title);
            if similarity >= self.title_threshold {
                return DedupOutcome::Duplicate {
                    existing_id: existing_id.clone(),
                    reason: DuplicateReason::TitleFuzzy,
                    similarity,
                };
            }
        }
        DedupOutcome::Admit
    }

    /// Records an admitted publication in both maps. The title map is only
    /// keyed when the normalized title is non-empty.
    pub fn admit(&mut self, publication: &Publication) {
        if let Some(doi) = publication.doi.as_deref() {
            self.by_doi
                .insert(doi.to_string(), publication.publication_id.clone());
        }
        if !publication.normalized_title.is_empty() {
            self.by_normalized_title.insert(
                publication.normalized_title.clone(),
                publication.publication_id.clone(),
            );
        }
    }
}

impl Default for PublicationDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_THRESHOLD)
    }
}
