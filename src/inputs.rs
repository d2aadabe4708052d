//! File loaders for the driver: raw Crossref author mentions, DOI lists,
//! and the optional MU-parameter table. Individual malformed mentions are
//! data-quality findings — skipped and counted, never fatal.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::entities::{AuthorMention, Publication};
use crate::normalize::{is_valid_orcid, normalize_doi};
use crate::scoring::MuTable;

/// One element of the `crossref_authors` JSON array. Every field except
/// `article_id` is tolerated missing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMentionRecord {
    #[serde(default)]
    pub article_id: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
}

impl RawMentionRecord {
    /// Preferred surface name: `original_name`, else "firstname lastname".
    fn surface_name(&self) -> Option<String> {
        if let Some(name) = self.original_name.as_deref() {
            let name = name.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
        let assembled = format!(
            "{} {}",
            self.firstname.as_deref().unwrap_or("").trim(),
            self.lastname.as_deref().unwrap_or("").trim()
        );
        let assembled = assembled.trim().to_string();
        if assembled.is_empty() {
            None
        } else {
            Some(assembled)
        }
    }
}

/// Mention records of one article, in file order.
#[derive(Debug, Clone)]
pub struct ArticleGroup {
    pub article_id: String,
    pub records: Vec<RawMentionRecord>,
}

/// Data-quality tallies produced while assembling publications.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestWarnings {
    pub skipped_mentions: u64,
    pub invalid_orcids: u64,
}

impl IngestWarnings {
    pub fn absorb(&mut self, other: IngestWarnings) {
        self.skipped_mentions += other.skipped_mentions;
        self.invalid_orcids += other.invalid_orcids;
    }
}

pub fn load_crossref_authors(path: &Path) -> Result<Vec<RawMentionRecord>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read authors file {}", path.display()))?;
    let records: Vec<RawMentionRecord> = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse authors file {}", path.display()))?;
    Ok(records)
}

/// DOI list: JSON array of strings, empty entries filtered, each
/// normalized to wire form.
pub fn load_dois(path: &Path) -> Result<Vec<String>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read DOI file {}", path.display()))?;
    let raw: Vec<String> = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse DOI file {}", path.display()))?;
    Ok(raw
        .iter()
        .filter_map(|doi| normalize_doi(doi))
        .collect())
}

pub fn load_mu_table(path: &Path) -> Result<MuTable> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read MU table {}", path.display()))?;
    let table: MuTable = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse MU table {}", path.display()))?;
    Ok(table)
}

/// Groups raw mention records by `article_id`, keeping first-seen article
/// order and file order within each article. Records without an article id
/// are skipped and counted.
pub fn group_by_article(records: Vec<RawMentionRecord>) -> (Vec<ArticleGroup>, IngestWarnings) {
    let mut warnings = IngestWarnings::default();
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<RawMentionRecord>> =
        std::collections::HashMap::new();
    for record in records {
        let article_id = match record.article_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                warnings.skipped_mentions += 1;
                continue;
            }
        };
        if !groups.contains_key(&article_id) {
            order.push(article_id.clone());
        }
        groups.entry(article_id).or_default().push(record);
    }
    let grouped = order
        .into_iter()
        .map(|article_id| {
            let records = groups.remove(&article_id).unwrap_or_default();
            ArticleGroup {
                article_id,
                records,
            }
        })
        .collect();
    (grouped, warnings)
}

/// Builds the Publication for one article group: positions are 1-based in
/// file order, co-author surface names cross-filled, invalid ORCIDs
/// dropped with a warning, nameless records skipped with a warning.
pub fn assemble_publication(group: &ArticleGroup) -> (Publication, IngestWarnings) {
    let mut warnings = IngestWarnings::default();
    let names: Vec<Option<String>> = group
        .records
        .iter()
        .map(RawMentionRecord::surface_name)
        .collect();

    let mut mentions = Vec::new();
    for (i, record) in group.records.iter().enumerate() {
        let Some(name) = names[i].clone() else {
            warnings.skipped_mentions += 1;
            continue;
        };
        let orcid = match record.orcid.as_deref().map(str::trim) {
            Some(orcid) if !orcid.is_empty() => {
                if is_valid_orcid(orcid) {
                    Some(orcid.to_string())
                } else {
                    warnings.invalid_orcids += 1;
                    None
                }
            }
            _ => None,
        };
        let affiliations: BTreeSet<String> = record
            .affiliation
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| BTreeSet::from([a.to_string()]))
            .unwrap_or_default();
        let coauthor_names: Vec<String> = names
            .iter()
            .enumerate()
            .filter(|(j, name)| *j != i && name.is_some())
            .filter_map(|(_, name)| name.clone())
            .collect();
        mentions.push(AuthorMention {
            name,
            orcid,
            affiliations,
            coauthor_names,
            position: (mentions.len() + 1) as u32,
        });
    }

    // Article ids from the Crossref corpus are DOIs more often than not;
    // when one normalizes to a DOI the dedup index can key on it.
    let doi = normalize_doi(&group.article_id).filter(|d| d.starts_with("10."));
    let publication = Publication::new(
        group.article_id.clone(),
        doi.as_deref(),
        String::new(),
        None,
        None,
        mentions,
    );
    (publication, warnings)
}

/// Serial convenience used by the evaluator CLI; the run pipeline
/// assembles groups on its worker pool instead.
pub fn assemble_all(groups: &[ArticleGroup]) -> (Vec<Publication>, IngestWarnings) {
    let mut warnings = IngestWarnings::default();
    let mut publications = Vec::with_capacity(groups.len());
    for group in groups {
        let (publication, w) = assemble_publication(group);
        warnings.absorb(w);
        publications.push(publication);
    }
    (publications, warnings)
}
