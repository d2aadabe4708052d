//! Pure normalization helpers shared by the deduplicator, the comparators,
//! and the trace redactor. Every function here is deterministic and
//! idempotent: `normalize(normalize(x)) == normalize(x)`.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use whatlang::Script;

/// Stopwords removed from titles before dedup comparison.
const TITLE_STOPWORDS: &[&str] = &["the", "a", "an", "of", "for", "and", "in", "on", "to", "by"];

/// Lowercases, NFKC-folds, strips punctuation, removes stopwords, and
/// collapses whitespace. The dedup index keys titles by this form.
pub fn normalize_title(title: &str) -> String {
    // Lowercasing must happen before the punctuation filter: a few
    // uppercase characters lowercase into base + combining mark, and the
    // mark has to be filtered like any other non-alphanumeric.
    let folded: String = title.nfkc().collect::<String>().to_lowercase();
    folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|token| !TITLE_STOPWORDS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercases, NFKC-folds, maps punctuation to spaces, and collapses
/// whitespace. Used for author names and institution strings alike.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name.nfkc().collect::<String>().to_lowercase();
    folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wire-level DOI normalization: lowercase, strip the resolver URL prefix,
/// trim. Returns `None` for strings that normalize to empty.
pub fn normalize_doi(doi: &str) -> Option<String> {
    let lowered = doi.trim().to_lowercase();
    let stripped = ["https://dx.doi.org/", "http://dx.doi.org/", "https://doi.org/", "http://doi.org/"]
        .iter()
        .find_map(|prefix| lowered.strip_prefix(prefix))
        .unwrap_or(&lowered);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Checks the `dddd-dddd-dddd-dddX` ORCID shape. Invalid ORCIDs are dropped
/// at the ingest boundary with a warning count; they never fail a decision.
pub fn is_valid_orcid(orcid: &str) -> bool {
    let bytes = orcid.as_bytes();
    if bytes.len() != 19 {
        return false;
    }
    for (i, b) in bytes.iter().enumerate() {
        match i {
            4 | 9 | 14 => {
                if *b != b'-' {
                    return false;
                }
            }
            18 => {
                if !b.is_ascii_digit() && *b != b'X' {
                    return false;
                }
            }
            _ => {
                if !b.is_ascii_digit() {
                    return false;
                }
            }
        }
    }
    true
}

/// Surname token of a normalized name. Handles both "smith, john" (comma
/// form keeps the surname first) and "john a smith" (surname last).
pub fn surname(name: &str) -> Option<String> {
    if let Some((family, _)) = name.split_once(',') {
        let family = normalize_name(family);
        return family.split_whitespace().last().map(str::to_string);
    }
    let normalized = normalize_name(name);
    normalized.split_whitespace().last().map(str::to_string)
}

/// First given-name initial of a normalized name, if any given name exists.
pub fn first_given_initial(name: &str) -> Option<char> {
    if let Some((_, given)) = name.split_once(',') {
        return normalize_name(given).chars().next();
    }
    let normalized = normalize_name(name);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    tokens.first().and_then(|t| t.chars().next())
}

/// The `(surname, initial)` blocking key, when both parts are present.
pub fn surname_initial_key(name: &str) -> Option<(String, char)> {
    let family = surname(name)?;
    let initial = first_given_initial(name)?;
    Some((family, initial))
}

/// Projects a name onto `surname + first initial` ("john a smith" ->
/// "smith j") for coauthor-set comparison.
pub fn surname_initial_label(name: &str) -> Option<String> {
    let family = surname(name)?;
    match first_given_initial(name) {
        Some(initial) => Some(format!("{family} {initial}")),
        None => Some(family),
    }
}

/// Script class reported in redacted trace records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    Latin,
    Cyrillic,
    Cjk,
    Mixed,
    Other,
}

fn classify_script(script: Script) -> ScriptType {
    match script {
        Script::Latin => ScriptType::Latin,
        Script::Cyrillic => ScriptType::Cyrillic,
        Script::Mandarin | Script::Katakana | Script::Hiragana | Script::Hangul => ScriptType::Cjk,
        _ => ScriptType::Other,
    }
}

/// Classifies the dominant script of a name. Tokens that disagree on their
/// script class make the whole name `Mixed`.
pub fn script_type(name: &str) -> ScriptType {
    let mut seen: Option<ScriptType> = None;
    for token in name.split_whitespace() {
        let Some(script) = whatlang::detect_script(token) else {
            continue;
        };
        let class = classify_script(script);
        match seen {
            None => seen = Some(class),
            Some(prev) if prev != class => return ScriptType::Mixed,
            Some(_) => {}
        }
    }
    seen.unwrap_or(ScriptType::Other)
}

/// Structural summary of a name, safe to log verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NameStructure {
    pub token_count: usize,
    pub avg_token_length: f64,
    pub script_type: ScriptType,
}

pub fn name_structure(name: &str) -> NameStructure {
    let normalized = normalize_name(name);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let total_chars: usize = tokens.iter().map(|t| t.chars().count()).sum();
    let avg = if tokens.is_empty() {
        0.0
    } else {
        total_chars as f64 / tokens.len() as f64
    };
    NameStructure {
        token_count: tokens.len(),
        avg_token_length: avg,
        script_type: script_type(name),
    }
}
