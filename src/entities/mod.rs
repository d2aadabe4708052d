//! Core value types: author profiles, publications, and the per-publication
//! author mentions they carry. All cross-references between entities are by
//! id; no entity holds a pointer to another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::normalize::{normalize_doi, normalize_title};

/// Persistent author identity aggregating many mentions.
///
/// `author_id` is unique and immutable. `orcid`, when set, is globally
/// unique across the index. `canonical_name` never changes after creation;
/// later surface forms accumulate in `aliases`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub author_id: Uuid,
    pub canonical_name: String,
    pub orcid: Option<String>,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[serde(default)]
    pub affiliations: BTreeSet<String>,
    #[serde(default)]
    pub coauthor_ids: BTreeSet<Uuid>,
    #[serde(default)]
    pub journals: BTreeSet<String>,
    #[serde(default)]
    pub publication_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthorProfile {
    pub fn new(author_id: Uuid, canonical_name: impl Into<String>, orcid: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            author_id,
            canonical_name: canonical_name.into(),
            orcid,
            aliases: BTreeSet::new(),
            affiliations: BTreeSet::new(),
            coauthor_ids: BTreeSet::new(),
            journals: BTreeSet::new(),
            publication_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl PartialEq for AuthorProfile {
    fn eq(&self, other: &Self) -> bool {
        self.author_id == other.author_id
    }
}

impl Eq for AuthorProfile {}

/// One surface occurrence of an author in one publication. Immutable once
/// ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorMention {
    pub name: String,
    pub orcid: Option<String>,
    #[serde(default)]
    pub affiliations: BTreeSet<String>,
    /// Surface names of the other mentions on the same publication, filled
    /// at ingest time for coauthor comparison.
    #[serde(default)]
    pub coauthor_names: Vec<String>,
    /// 1-based author position on the publication.
    pub position: u32,
}

impl AuthorMention {
    pub fn mention_id(&self, publication_id: &str) -> String {
        format!("{publication_id}#{}", self.position)
    }
}

/// An admitted publication. `normalized_title` is a deterministic function
/// of `title`; `doi` is stored in normalized wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub publication_id: String,
    pub doi: Option<String>,
    pub title: String,
    pub normalized_title: String,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub mentions: Vec<AuthorMention>,
}

impl Publication {
    pub fn new(
        publication_id: impl Into<String>,
        doi: Option<&str>,
        title: impl Into<String>,
        year: Option<i32>,
        journal: Option<String>,
        mentions: Vec<AuthorMention>,
    ) -> Self {
        let title = title.into();
        let normalized_title = normalize_title(&title);
        Self {
            publication_id: publication_id.into(),
            doi: doi.and_then(normalize_doi),
            title,
            normalized_title,
            year,
            journal,
            mentions,
        }
    }
}

/// The MERGE payload: sets to union into an existing profile. The index
/// applies deltas; `canonical_name` and `orcid` are never part of one.
#[derive(Debug, Clone, Default)]
pub struct ProfileDelta {
    pub aliases: BTreeSet<String>,
    pub affiliations: BTreeSet<String>,
    pub coauthor_ids: BTreeSet<Uuid>,
    pub journals: BTreeSet<String>,
    pub publication_ids: BTreeSet<String>,
}

impl ProfileDelta {
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
            && self.affiliations.is_empty()
            && self.coauthor_ids.is_empty()
            && self.journals.is_empty()
            && self.publication_ids.is_empty()
    }
}
