//! ORCID gold-set construction and clustering metrics.
//!
//! The gold set treats an ORCID as ground-truth identity: every mention
//! carrying the same valid ORCID belongs to one author. Metrics compare a
//! predicted assignment against the gold assignment on their common
//! mention set; one-sided mentions are excluded and counted as warnings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::Publication;
use crate::normalize::is_valid_orcid;

pub const DEFAULT_MIN_MENTIONS: usize = 2;

/// Builds `mention_id -> orcid` ground truth from a corpus. ORCIDs seen on
/// fewer than `min_mentions` mentions carry too little signal and are
/// dropped.
pub fn build_gold_set(
    publications: &[Publication],
    min_mentions: usize,
) -> BTreeMap<String, String> {
    let mut by_orcid: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for publication in publications {
        for mention in &publication.mentions {
            let Some(orcid) = mention.orcid.as_deref() else {
                continue;
            };
            if !is_valid_orcid(orcid) {
                continue;
            }
            by_orcid
                .entry(orcid.to_string())
                .or_default()
                .push(mention.mention_id(&publication.publication_id));
        }
    }
    let mut gold = BTreeMap::new();
    for (orcid, mention_ids) in by_orcid {
        if mention_ids.len() < min_mentions {
            continue;
        }
        for mention_id in mention_ids {
            gold.insert(mention_id, orcid.clone());
        }
    }
    gold
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PairwiseMetrics {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BCubedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub evaluated_mentions: usize,
    /// Mentions present in the prediction but absent from the gold set.
    pub predicted_only: usize,
    /// Gold mentions the prediction never assigned.
    pub gold_only: usize,
    pub pairwise: PairwiseMetrics,
    pub b_cubed: BCubedMetrics,
}

fn ratio(numerator: u64, denominator: u64, vacuous: f64) -> f64 {
    if denominator == 0 {
        vacuous
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic(p: f64, r: f64) -> f64 {
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// Compares two cluster assignments over their common mention set.
pub fn evaluate(
    predicted: &BTreeMap<String, String>,
    gold: &BTreeMap<String, String>,
) -> EvaluationReport {
    let mentions: Vec<&String> = predicted.keys().filter(|m| gold.contains_key(*m)).collect();
    let predicted_only = predicted.len() - mentions.len();
    let gold_only = gold.len() - mentions.len();

    // Pairwise counts over unordered pairs.
    let mut tp = 0u64;
    let mut fp = 0u64;
    let mut fn_ = 0u64;
    for i in 0..mentions.len() {
        for j in (i + 1)..mentions.len() {
            let same_predicted = predicted[mentions[i]] == predicted[mentions[j]];
            let same_gold = gold[mentions[i]] == gold[mentions[j]];
            match (same_predicted, same_gold) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }
    }
    // With no positive pairs on either side the assignment is vacuously
    // perfect; a missing side alone scores zero.
    let pairwise_precision = ratio(tp, tp + fp, if fn_ == 0 { 1.0 } else { 0.0 });
    let pairwise_recall = ratio(tp, tp + fn_, if fp == 0 { 1.0 } else { 0.0 });
    let pairwise = PairwiseMetrics {
        true_positives: tp,
        false_positives: fp,
        false_negatives: fn_,
        precision: pairwise_precision,
        recall: pairwise_recall,
        f1: harmonic(pairwise_precision, pairwise_recall),
    };

    // B-cubed: per-mention cluster overlap, macro-averaged.
    let mut predicted_sizes: BTreeMap<&String, u64> = BTreeMap::new();
    let mut gold_sizes: BTreeMap<&String, u64> = BTreeMap::new();
    let mut overlap_sizes: BTreeMap<(&String, &String), u64> = BTreeMap::new();
    for mention in &mentions {
        let p = &predicted[*mention];
        let g = &gold[*mention];
        *predicted_sizes.entry(p).or_default() += 1;
        *gold_sizes.entry(g).or_default() += 1;
        *overlap_sizes.entry((p, g)).or_default() += 1;
    }
    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    for mention in &mentions {
        let p = &predicted[*mention];
        let g = &gold[*mention];
        let overlap = overlap_sizes[&(p, g)] as f64;
        precision_sum += overlap / predicted_sizes[p] as f64;
        recall_sum += overlap / gold_sizes[g] as f64;
    }
    let b_cubed = if mentions.is_empty() {
        BCubedMetrics::default()
    } else {
        let precision = precision_sum / mentions.len() as f64;
        let recall = recall_sum / mentions.len() as f64;
        BCubedMetrics {
            precision,
            recall,
            f1: harmonic(precision, recall),
        }
    };

    EvaluationReport {
        evaluated_mentions: mentions.len(),
        predicted_only,
        gold_only,
        pairwise,
        b_cubed,
    }
}
