//! Redacted, append-only decision trace plus the review queue and the run
//! manifest.
//!
//! Every decision emits exactly one JSONL record; UNKNOWN decisions are
//! additionally appended to the review stream. Records never carry a
//! plaintext name, DOI, title, or institution: names and publication ids
//! are salted hashes, names additionally get a structural summary. Given
//! identical inputs, config, and seed, the emitted byte stream is
//! identical across runs, which is why record timestamps derive from the
//! run rather than the wall clock.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::compare::Feature;
use crate::engine::{Decision, MentionDecision, Thresholds};
use crate::normalize::{name_structure, NameStructure};
use crate::scoring::ComponentScore;

/// First 12 hex characters of SHA-256(value || salt).
pub fn redact(value: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();
    let hex = format!("{digest:x}");
    hex[..12].to_string()
}

/// One line of `trace.jsonl` / `review.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub run_id: String,
    pub seq: u64,
    pub timestamp: String,
    pub decision: Decision,
    pub score_total: f64,
    pub score_components: BTreeMap<Feature, ComponentScore>,
    pub thresholds: Thresholds,
    pub best_author_id: Option<Uuid>,
    pub mention_name_redacted: String,
    pub mention_name_structure: NameStructure,
    /// Salted hash of the raw publication id (raw ids can embed DOIs).
    pub publication_id: String,
    pub deterministic_hash: String,
}

/// Tallies reported in the manifest and in `results.json`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub merge: u64,
    pub new: u64,
    pub unknown: u64,
}

impl DecisionCounts {
    pub fn tally(&mut self, decision: Decision) {
        match decision {
            Decision::Merge => self.merge += 1,
            Decision::New => self.new += 1,
            Decision::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.merge + self.new + self.unknown
    }
}

/// Scoped writer for the trace and review streams. Acquired once at the
/// top of a run and flushed on every exit path, success or not.
pub struct TraceLog {
    run_id: String,
    redaction_salt: String,
    backend: String,
    thresholds: Thresholds,
    epoch: DateTime<Utc>,
    seq: u64,
    trace: BufWriter<File>,
    review: BufWriter<File>,
}

impl TraceLog {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        trace_path: &Path,
        review_path: &Path,
        run_id: impl Into<String>,
        redaction_salt: impl Into<String>,
        backend: impl Into<String>,
        thresholds: Thresholds,
        seed: u64,
    ) -> Result<Self> {
        let trace = open_stream(trace_path)?;
        let review = open_stream(review_path)?;
        Ok(Self {
            run_id: run_id.into(),
            redaction_salt: redaction_salt.into(),
            backend: backend.into(),
            thresholds,
            epoch: run_epoch(seed),
            seq: 0,
            trace,
            review,
        })
    }

    /// Commits one decision: assigns the next sequence number, builds the
    /// redacted record, appends it to the trace (and to the review stream
    /// for UNKNOWN), and returns it.
    pub fn commit(
        &mut self,
        raw_publication_id: &str,
        decision: &MentionDecision,
    ) -> Result<TraceRecord> {
        let seq = self.seq;
        self.seq += 1;

        let mention_name_redacted = redact(&decision.mention_name, &self.redaction_salt);
        let publication_id = redact(raw_publication_id, &self.redaction_salt);
        let deterministic_hash = self.decision_hash(seq, &publication_id, &mention_name_redacted, decision);

        let record = TraceRecord {
            run_id: self.run_id.clone(),
            seq,
            timestamp: self.timestamp_for(seq),
            decision: decision.decision,
            score_total: decision.breakdown.total,
            score_components: decision.breakdown.components.clone(),
            thresholds: self.thresholds,
            best_author_id: decision.best_author_id,
            mention_name_redacted,
            mention_name_structure: name_structure(&decision.mention_name),
            publication_id,
            deterministic_hash,
        };

        append_line(&mut self.trace, &record)?;
        if record.decision == Decision::Unknown {
            append_line(&mut self.review, &record)?;
        }
        Ok(record)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.trace.flush().context("failed to flush trace stream")?;
        self.review.flush().context("failed to flush review stream")?;
        Ok(())
    }

    pub fn decisions_committed(&self) -> u64 {
        self.seq
    }

    fn timestamp_for(&self, seq: u64) -> String {
        let at = self.epoch + Duration::milliseconds(seq as i64);
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Canonical decision-input hash. The serialization is a `|`-joined
    /// string of: run id, seq, hashed publication id, redacted mention,
    /// backend, both thresholds, the sorted candidate ids joined by `,`,
    /// the decision, and the total score.
    fn decision_hash(
        &self,
        seq: u64,
        publication_id: &str,
        mention_name_redacted: &str,
        decision: &MentionDecision,
    ) -> String {
        let candidates = decision
            .candidate_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let canonical = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.run_id,
            seq,
            publication_id,
            mention_name_redacted,
            self.backend,
            self.thresholds.accept,
            self.thresholds.reject,
            candidates,
            decision.decision.as_str(),
            decision.breakdown.total,
        );
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn open_stream(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn append_line<T: Serialize>(writer: &mut BufWriter<File>, value: &T) -> Result<()> {
    writer.write_all(serde_json::to_string(value)?.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Fixed run epoch: 2000-01-01T00:00:00Z advanced by the seed, so trace
/// timestamps are a pure function of the run configuration.
fn run_epoch(seed: u64) -> DateTime<Utc> {
    let base = Utc
        .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    base + Duration::seconds((seed % 1_000_000_000) as i64)
}

/// Per-run summary written next to the outputs. Unlike the trace, the
/// manifest is allowed wall-clock timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    /// "completed", "cancelled", or "aborted".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub cancelled: bool,
    pub config_hash: String,
    pub version: String,
    pub seed: u64,
    pub backend: String,
    pub thresholds: Thresholds,
    pub input_publications: u64,
    pub input_mentions: u64,
    pub duplicate_publications: u64,
    pub decision_counts: DecisionCounts,
    pub skipped_mentions: u64,
    pub invalid_orcids: u64,
    pub failed_dois: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunManifest {
    pub fn persist(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path.to_path_buf())
    }
}
