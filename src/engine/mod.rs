//! The three-way decision engine: blocking, candidate scoring, and the
//! MERGE / NEW / UNKNOWN policy, plus the profile mutations each decision
//! entails. All mutation happens here, on the decision lane.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::compare;
use crate::entities::{AuthorMention, AuthorProfile, ProfileDelta, Publication};
use crate::error::RunError;
use crate::index::AuthorIndex;
use crate::scoring::{ScoreBreakdown, Scorer};

/// Outcome of the dual-threshold policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Merge,
    New,
    Unknown,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Merge => "merge",
            Decision::New => "new",
            Decision::Unknown => "unknown",
        }
    }
}

/// Accept/reject score thresholds. `reject > accept` is rejected at
/// construction, before any trace output exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub accept: f64,
    pub reject: f64,
}

impl Thresholds {
    pub fn new(accept: f64, reject: f64) -> Result<Self, RunError> {
        if reject > accept {
            return Err(RunError::Config(format!(
                "reject threshold {reject} exceeds accept threshold {accept}"
            )));
        }
        Ok(Self { accept, reject })
    }

    pub fn decide(&self, score: f64) -> Decision {
        if score >= self.accept {
            Decision::Merge
        } else if score <= self.reject {
            Decision::New
        } else {
            Decision::Unknown
        }
    }
}

/// One committed decision, carrying everything the trace needs.
#[derive(Debug, Clone)]
pub struct MentionDecision {
    pub mention_id: String,
    pub mention_name: String,
    pub position: u32,
    pub decision: Decision,
    /// Profile the mention resolved to: the merge target or the freshly
    /// created profile. `None` for UNKNOWN.
    pub resolved_author_id: Option<Uuid>,
    /// Best-scoring blocked candidate, if any candidate was scored.
    pub best_author_id: Option<Uuid>,
    pub breakdown: ScoreBreakdown,
    /// Blocked candidate ids, sorted; input to the deterministic hash.
    pub candidate_ids: Vec<Uuid>,
}

/// Blocking, scoring, decision, and mutation for one run. Owns the index;
/// new-profile ids are drawn from the run's seeded RNG so reruns with the
/// same seed reproduce them.
pub struct DecisionEngine {
    index: AuthorIndex,
    scorer: Scorer,
    thresholds: Thresholds,
    rng: StdRng,
}

impl DecisionEngine {
    pub fn new(scorer: Scorer, thresholds: Thresholds, seed: u64) -> Self {
        Self {
            index: AuthorIndex::new(),
            scorer,
            thresholds,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn index(&self) -> &AuthorIndex {
        &self.index
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Decides every mention of an admitted publication in position order,
    /// then wires within-publication co-authorship across the resolved
    /// mentions. Either all of a publication's decisions commit or, on a
    /// fatal error, the run aborts; no partial publication survives.
    pub fn process_publication(
        &mut self,
        publication: &Publication,
    ) -> Result<Vec<MentionDecision>> {
        let mut decisions = Vec::with_capacity(publication.mentions.len());
        for mention in &publication.mentions {
            let decision = self.decide_mention(publication, mention)?;
            decisions.push(decision);
        }
        self.wire_coauthors(&decisions)?;
        Ok(decisions)
    }

    fn decide_mention(
        &mut self,
        publication: &Publication,
        mention: &AuthorMention,
    ) -> Result<MentionDecision> {
        let candidate_ids = self.index.block(mention);
        let journal = publication.journal.as_deref();

        let mut best: Option<(Uuid, ScoreBreakdown)> = None;
        for candidate_id in &candidate_ids {
            let profile = self
                .index
                .get(candidate_id)
                .with_context(|| format!("blocked candidate {candidate_id} not in index"))?;
            let vector = compare::compare(mention, journal, profile, &self.index)?;
            let breakdown = self.scorer.score(&vector)?;
            let better = match &best {
                None => true,
                // Tie-break on ascending author id; candidate_ids are
                // sorted, so the first of equal scores wins.
                Some((_, current)) => breakdown.total > current.total,
            };
            if better {
                best = Some((*candidate_id, breakdown));
            }
        }

        let (decision, best_author_id, breakdown) = match best {
            None => (Decision::New, None, ScoreBreakdown::default()),
            Some((id, breakdown)) => (self.thresholds.decide(breakdown.total), Some(id), breakdown),
        };

        let resolved_author_id = match (decision, best_author_id) {
            (Decision::Merge, Some(target)) => {
                self.apply_merge(&target, publication, mention)?;
                Some(target)
            }
            (Decision::Merge, None) => {
                anyhow::bail!("merge decided without a scored candidate")
            }
            (Decision::New, _) => Some(self.apply_new(publication, mention)?),
            (Decision::Unknown, _) => None,
        };

        Ok(MentionDecision {
            mention_id: mention.mention_id(&publication.publication_id),
            mention_name: mention.name.clone(),
            position: mention.position,
            decision,
            resolved_author_id,
            best_author_id,
            breakdown,
            candidate_ids,
        })
    }

    fn apply_merge(
        &mut self,
        target: &Uuid,
        publication: &Publication,
        mention: &AuthorMention,
    ) -> Result<()> {
        let mut delta = ProfileDelta {
            affiliations: mention.affiliations.clone(),
            ..ProfileDelta::default()
        };
        delta
            .publication_ids
            .insert(publication.publication_id.clone());
        if let Some(journal) = &publication.journal {
            delta.journals.insert(journal.clone());
        }
        let canonical_differs = self
            .index
            .get(target)
            .with_context(|| format!("merge target {target} not in index"))?
            .canonical_name
            != mention.name;
        if canonical_differs {
            delta.aliases.insert(mention.name.clone());
        }
        self.index.update(target, delta)
    }

    fn apply_new(&mut self, publication: &Publication, mention: &AuthorMention) -> Result<Uuid> {
        let author_id = Uuid::from_u128(self.rng.gen());
        let mut profile = AuthorProfile::new(author_id, mention.name.clone(), mention.orcid.clone());
        profile.affiliations = mention.affiliations.clone();
        profile
            .publication_ids
            .insert(publication.publication_id.clone());
        if let Some(journal) = &publication.journal {
            profile.journals.insert(journal.clone());
        }
        self.index.insert(profile)?;
        Ok(author_id)
    }

    /// Links every pair of resolved mentions of one publication through
    /// `coauthor_ids`. UNKNOWN mentions resolved to no profile and are
    /// excluded.
    fn wire_coauthors(&mut self, decisions: &[MentionDecision]) -> Result<()> {
        let resolved: BTreeSet<Uuid> = decisions
            .iter()
            .filter_map(|d| d.resolved_author_id)
            .collect();
        if resolved.len() < 2 {
            return Ok(());
        }
        for id in &resolved {
            let mut delta = ProfileDelta::default();
            delta.coauthor_ids = resolved.iter().copied().filter(|c| c != id).collect();
            self.index.update(id, delta)?;
        }
        Ok(())
    }
}
