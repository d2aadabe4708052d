//! In-memory author store with the blocking indices the decision engine
//! queries before scoring. The index is the sole owner of profiles; it is
//! only ever mutated from the decision lane.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::entities::{AuthorMention, AuthorProfile, ProfileDelta};
use crate::error::RunError;
use crate::normalize::{normalize_name, surname, surname_initial_key};

/// Author store plus four secondary indices over the live profile set.
/// List-valued indices stay sorted by author id so candidate iteration is
/// deterministic.
#[derive(Debug, Default)]
pub struct AuthorIndex {
    by_id: BTreeMap<Uuid, AuthorProfile>,
    by_orcid: BTreeMap<String, Uuid>,
    by_surname: BTreeMap<String, Vec<Uuid>>,
    by_surname_initial: BTreeMap<(String, char), Vec<Uuid>>,
    by_affiliation: BTreeMap<String, Vec<Uuid>>,
}

impl AuthorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&AuthorProfile> {
        self.by_id.get(id)
    }

    pub fn find_by_orcid(&self, orcid: &str) -> Option<&AuthorProfile> {
        self.by_orcid.get(orcid).and_then(|id| self.by_id.get(id))
    }

    /// Profiles in ascending author-id order.
    pub fn profiles(&self) -> impl Iterator<Item = &AuthorProfile> {
        self.by_id.values()
    }

    pub fn orcid_count(&self) -> usize {
        self.by_orcid.len()
    }

    /// Candidate author ids for a mention: ORCID hit, surname block,
    /// surname+initial block, and every affiliation block, deduplicated and
    /// sorted by author id.
    pub fn block(&self, mention: &AuthorMention) -> Vec<Uuid> {
        let mut candidates: BTreeSet<Uuid> = BTreeSet::new();
        if let Some(orcid) = mention.orcid.as_deref() {
            if let Some(id) = self.by_orcid.get(orcid) {
                candidates.insert(*id);
            }
        }
        if let Some(family) = surname(&mention.name) {
            if let Some(ids) = self.by_surname.get(&family) {
                candidates.extend(ids.iter().copied());
            }
        }
        if let Some(key) = surname_initial_key(&mention.name) {
            if let Some(ids) = self.by_surname_initial.get(&key) {
                candidates.extend(ids.iter().copied());
            }
        }
        for affiliation in &mention.affiliations {
            let key = normalize_name(affiliation);
            if let Some(ids) = self.by_affiliation.get(&key) {
                candidates.extend(ids.iter().copied());
            }
        }
        candidates.into_iter().collect()
    }

    /// Inserts a new profile, indexing its canonical name, aliases, and
    /// affiliations. Fails on a duplicate author id or a duplicate ORCID.
    pub fn insert(&mut self, profile: AuthorProfile) -> Result<(), RunError> {
        if self.by_id.contains_key(&profile.author_id) {
            return Err(RunError::DuplicateAuthorId(profile.author_id));
        }
        if let Some(orcid) = profile.orcid.as_deref() {
            if let Some(existing) = self.by_orcid.get(orcid) {
                return Err(RunError::DuplicateOrcid {
                    orcid: orcid.to_string(),
                    existing: *existing,
                });
            }
            self.by_orcid.insert(orcid.to_string(), profile.author_id);
        }
        self.index_name(&profile.canonical_name, profile.author_id);
        for alias in &profile.aliases {
            self.index_name(alias, profile.author_id);
        }
        for affiliation in &profile.affiliations {
            self.index_affiliation(affiliation, profile.author_id);
        }
        self.by_id.insert(profile.author_id, profile);
        Ok(())
    }

    /// Merges a delta into an existing profile: set unions only, plus a
    /// refresh of `updated_at`. Canonical name and ORCID are untouched.
    /// Newly added aliases and affiliations join the blocking indices so
    /// later mentions can block on them.
    pub fn update(&mut self, id: &Uuid, delta: ProfileDelta) -> Result<()> {
        let new_aliases: Vec<String>;
        let new_affiliations: Vec<String>;
        {
            let profile = self
                .by_id
                .get_mut(id)
                .with_context(|| format!("update target {id} not in index"))?;
            new_aliases = delta
                .aliases
                .iter()
                .filter(|a| !profile.aliases.contains(*a) && **a != profile.canonical_name)
                .cloned()
                .collect();
            new_affiliations = delta
                .affiliations
                .iter()
                .filter(|a| !profile.affiliations.contains(*a))
                .cloned()
                .collect();
            profile.aliases.extend(new_aliases.iter().cloned());
            profile.affiliations.extend(new_affiliations.iter().cloned());
            let own_id = profile.author_id;
            profile
                .coauthor_ids
                .extend(delta.coauthor_ids.iter().filter(|c| **c != own_id));
            profile.journals.extend(delta.journals.iter().cloned());
            profile
                .publication_ids
                .extend(delta.publication_ids.iter().cloned());
            profile.updated_at = Utc::now();
        }
        for alias in &new_aliases {
            self.index_name(alias, *id);
        }
        for affiliation in &new_affiliations {
            self.index_affiliation(affiliation, *id);
        }
        Ok(())
    }

    fn index_name(&mut self, name: &str, id: Uuid) {
        if let Some(family) = surname(name) {
            push_sorted(self.by_surname.entry(family).or_default(), id);
        }
        if let Some(key) = surname_initial_key(name) {
            push_sorted(self.by_surname_initial.entry(key).or_default(), id);
        }
    }

    fn index_affiliation(&mut self, affiliation: &str, id: Uuid) {
        let key = normalize_name(affiliation);
        if key.is_empty() {
            return;
        }
        push_sorted(self.by_affiliation.entry(key).or_default(), id);
    }
}

/// Keeps list-valued index entries sorted and free of duplicates.
fn push_sorted(ids: &mut Vec<Uuid>, id: Uuid) {
    if let Err(pos) = ids.binary_search(&id) {
        ids.insert(pos, id);
    }
}
