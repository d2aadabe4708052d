//! Per-feature similarity comparators. Each produces a raw similarity in
//! [0,1] together with a discrete bin; the scorer consumes the bins (for
//! Fellegi-Sunter weights) and the raw values (for the baseline).
//!
//! Comparators are pure and deterministic. A NaN similarity is reported as
//! a fatal error rather than coerced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strsim::jaro_winkler;

use crate::entities::{AuthorMention, AuthorProfile};
use crate::error::RunError;
use crate::index::AuthorIndex;
use crate::normalize::{normalize_name, normalize_title, surname_initial_label};

/// The five compared features, in scoring order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Name,
    Orcid,
    Coauthor,
    Journal,
    Affiliation,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Name,
        Feature::Orcid,
        Feature::Coauthor,
        Feature::Journal,
        Feature::Affiliation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Name => "name",
            Feature::Orcid => "orcid",
            Feature::Coauthor => "coauthor",
            Feature::Journal => "journal",
            Feature::Affiliation => "affiliation",
        }
    }
}

/// Discrete comparison outcome. String-similarity features use
/// `Exact..None`; the ORCID feature uses `Match/Mismatch/Missing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bin {
    Exact,
    High,
    Medium,
    Low,
    None,
    Match,
    Mismatch,
    Missing,
}

impl Bin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bin::Exact => "exact",
            Bin::High => "high",
            Bin::Medium => "medium",
            Bin::Low => "low",
            Bin::None => "none",
            Bin::Match => "match",
            Bin::Mismatch => "mismatch",
            Bin::Missing => "missing",
        }
    }
}

/// One comparator's output: raw similarity plus its bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub value: f64,
    pub bin: Bin,
}

/// The full comparison vector for one (mention, candidate) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonVector {
    pub name: FeatureScore,
    pub orcid: FeatureScore,
    pub coauthor: FeatureScore,
    pub journal: FeatureScore,
    pub affiliation: FeatureScore,
}

impl ComparisonVector {
    pub fn get(&self, feature: Feature) -> FeatureScore {
        match feature {
            Feature::Name => self.name,
            Feature::Orcid => self.orcid,
            Feature::Coauthor => self.coauthor,
            Feature::Journal => self.journal,
            Feature::Affiliation => self.affiliation,
        }
    }
}

fn guard(value: f64, feature: &'static str) -> Result<f64, RunError> {
    if value.is_nan() {
        return Err(RunError::NanSimilarity(feature));
    }
    Ok(value)
}

fn name_bin(value: f64) -> Bin {
    if value >= 0.98 {
        Bin::Exact
    } else if value >= 0.90 {
        Bin::High
    } else if value >= 0.75 {
        Bin::Medium
    } else if value >= 0.60 {
        Bin::Low
    } else {
        Bin::None
    }
}

fn jaccard_bin(value: f64) -> Bin {
    if value >= 0.5 {
        Bin::High
    } else if value >= 0.2 {
        Bin::Medium
    } else if value > 0.0 {
        Bin::Low
    } else {
        Bin::None
    }
}

/// True when two normalized names differ only by expanding initials:
/// same surname, and every aligned given token matches exactly or one side
/// is the single-character initial of the other.
fn initial_expansion_match(a: &str, b: &str) -> bool {
    let a_tokens: Vec<&str> = a.split_whitespace().collect();
    let b_tokens: Vec<&str> = b.split_whitespace().collect();
    if a_tokens.len() < 2 || b_tokens.len() < 2 {
        return false;
    }
    if a_tokens.last() != b_tokens.last() {
        return false;
    }
    let a_given = &a_tokens[..a_tokens.len() - 1];
    let b_given = &b_tokens[..b_tokens.len() - 1];
    a_given.iter().zip(b_given.iter()).all(|(x, y)| {
        x == y
            || (x.chars().count() == 1 && y.starts_with(*x))
            || (y.chars().count() == 1 && x.starts_with(*y))
    })
}

/// Jaro-Winkler over the normalized mention name against the candidate's
/// canonical name and every alias, keeping the maximum. Initial-expansion
/// pairs are floored into the `high` bin.
pub fn compare_name(
    mention: &AuthorMention,
    profile: &AuthorProfile,
) -> Result<FeatureScore, RunError> {
    let mention_name = normalize_name(&mention.name);
    let mut best: f64 = 0.0;
    let mut initials_matched = false;
    for candidate in std::iter::once(profile.canonical_name.as_str())
        .chain(profile.aliases.iter().map(String::as_str))
    {
        let candidate = normalize_name(candidate);
        best = best.max(jaro_winkler(&mention_name, &candidate));
        initials_matched |= initial_expansion_match(&mention_name, &candidate);
    }
    if initials_matched {
        best = best.max(0.90);
    }
    let value = guard(best, "name")?;
    Ok(FeatureScore {
        value,
        bin: name_bin(value),
    })
}

/// Exact ORCID comparison. Absence on either side is no-information, not
/// evidence against.
pub fn compare_orcid(mention: &AuthorMention, profile: &AuthorProfile) -> FeatureScore {
    match (mention.orcid.as_deref(), profile.orcid.as_deref()) {
        (Some(a), Some(b)) if a == b => FeatureScore {
            value: 1.0,
            bin: Bin::Match,
        },
        (Some(_), Some(_)) => FeatureScore {
            value: 0.0,
            bin: Bin::Mismatch,
        },
        _ => FeatureScore {
            value: 0.5,
            bin: Bin::Missing,
        },
    }
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Jaccard over surname+initial projections of the mention's co-author
/// names against the candidate's coauthor profiles resolved via the index.
pub fn compare_coauthors(
    mention: &AuthorMention,
    profile: &AuthorProfile,
    index: &AuthorIndex,
) -> Result<FeatureScore, RunError> {
    let mention_set: BTreeSet<String> = mention
        .coauthor_names
        .iter()
        .filter_map(|name| surname_initial_label(name))
        .collect();
    let profile_set: BTreeSet<String> = profile
        .coauthor_ids
        .iter()
        .filter_map(|id| index.get(id))
        .filter_map(|coauthor| surname_initial_label(&coauthor.canonical_name))
        .collect();
    let value = guard(jaccard(&mention_set, &profile_set), "coauthor")?;
    Ok(FeatureScore {
        value,
        bin: jaccard_bin(value),
    })
}

/// Jaccard over normalized journal-title sets. The mention side is the
/// journal of the publication carrying it.
pub fn compare_journals(
    publication_journal: Option<&str>,
    profile: &AuthorProfile,
) -> Result<FeatureScore, RunError> {
    let mention_set: BTreeSet<String> = publication_journal
        .map(normalize_title)
        .filter(|j| !j.is_empty())
        .into_iter()
        .collect();
    let profile_set: BTreeSet<String> = profile
        .journals
        .iter()
        .map(|j| normalize_title(j))
        .filter(|j| !j.is_empty())
        .collect();
    let value = guard(jaccard(&mention_set, &profile_set), "journal")?;
    Ok(FeatureScore {
        value,
        bin: jaccard_bin(value),
    })
}

/// Maximum pairwise Jaro-Winkler over normalized institution strings.
pub fn compare_affiliations(
    mention: &AuthorMention,
    profile: &AuthorProfile,
) -> Result<FeatureScore, RunError> {
    let mut best: f64 = 0.0;
    for a in &mention.affiliations {
        let a = normalize_name(a);
        if a.is_empty() {
            continue;
        }
        for b in &profile.affiliations {
            let b = normalize_name(b);
            if b.is_empty() {
                continue;
            }
            best = best.max(jaro_winkler(&a, &b));
        }
    }
    let value = guard(best, "affiliation")?;
    Ok(FeatureScore {
        value,
        bin: name_bin(value),
    })
}

/// Builds the full comparison vector for one candidate.
pub fn compare(
    mention: &AuthorMention,
    publication_journal: Option<&str>,
    profile: &AuthorProfile,
    index: &AuthorIndex,
) -> Result<ComparisonVector, RunError> {
    Ok(ComparisonVector {
        name: compare_name(mention, profile)?,
        orcid: compare_orcid(mention, profile),
        coauthor: compare_coauthors(mention, profile, index)?,
        journal: compare_journals(publication_journal, profile)?,
        affiliation: compare_affiliations(mention, profile)?,
    })
}
