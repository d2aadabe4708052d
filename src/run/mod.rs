//! Run orchestration: one immutable `RunConfig`, a bounded
//! producer/consumer pipeline (parse workers feeding a single decision
//! lane), and the scoped trace/manifest writers.
//!
//! The decision lane is the only place the index, the dedup store, and the
//! trace are touched, and it consumes publications in ingest order. That
//! single-writer discipline is what makes reruns byte-identical.

use anyhow::{Context, Result};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread;
use uuid::Uuid;

use crate::dedup::{DedupOutcome, PublicationDeduplicator, DEFAULT_TITLE_THRESHOLD};
use crate::engine::{DecisionEngine, Thresholds};
use crate::entities::Publication;
use crate::error::RunError;
use crate::inputs::{self, ArticleGroup, IngestWarnings};
use crate::scoring::{MuTable, ScoreBackend, Scorer};
use crate::trace::{DecisionCounts, RunManifest, TraceLog};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_REDACTION_SALT: &str = "authorlink-trace-v1";

pub const BASELINE_ACCEPT: f64 = 0.90;
pub const BASELINE_REJECT: f64 = 0.20;
pub const FS_ACCEPT: f64 = 3.0;
pub const FS_REJECT: f64 = -3.0;

/// All knobs of one run, fixed before any work starts. Defaults are
/// centralized here; the CLI only overrides.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub mode: ScoreBackend,
    pub accept_threshold: f64,
    pub reject_threshold: f64,
    pub title_threshold: f64,
    pub seed: u64,
    pub max_workers: usize,
    pub mu_table_path: Option<PathBuf>,
    pub redaction_salt: String,
    pub limit: Option<usize>,
    pub run_id: Option<String>,
}

impl RunConfig {
    /// Mode-appropriate defaults: the two backends score on different
    /// scales, so their thresholds differ.
    pub fn for_mode(mode: ScoreBackend) -> Self {
        let (accept, reject) = match mode {
            ScoreBackend::Baseline => (BASELINE_ACCEPT, BASELINE_REJECT),
            ScoreBackend::FellegiSunter => (FS_ACCEPT, FS_REJECT),
        };
        Self {
            mode,
            accept_threshold: accept,
            reject_threshold: reject,
            title_threshold: DEFAULT_TITLE_THRESHOLD,
            seed: DEFAULT_SEED,
            max_workers: DEFAULT_MAX_WORKERS,
            mu_table_path: None,
            redaction_salt: DEFAULT_REDACTION_SALT.to_string(),
            limit: None,
            run_id: None,
        }
    }

    pub fn thresholds(&self) -> Result<Thresholds, RunError> {
        Thresholds::new(self.accept_threshold, self.reject_threshold)
    }

    /// Explicit run id, or a slug drawn from the seeded RNG so reruns with
    /// the same seed land in the same place.
    pub fn resolved_run_id(&self) -> String {
        if let Some(run_id) = &self.run_id {
            return run_id.clone();
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let slug: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        format!("run-{}", slug.to_lowercase())
    }

    /// SHA-256 over the canonical JSON serialization of the config.
    pub fn config_hash(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn mu_table(&self) -> Result<MuTable> {
        match &self.mu_table_path {
            Some(path) => inputs::load_mu_table(path),
            None => Ok(MuTable::builtin()),
        }
    }
}

/// Where the four outputs land.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub trace_jsonl: PathBuf,
    pub review_jsonl: PathBuf,
    pub results: PathBuf,
    pub manifest: PathBuf,
}

impl RunPaths {
    /// Default layout: everything next to the results file.
    pub fn for_output(results: &Path) -> Self {
        let dir = results.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            trace_jsonl: dir.join("trace.jsonl"),
            review_jsonl: dir.join("review.jsonl"),
            results: results.to_path_buf(),
            manifest: dir.join("run_manifest.json"),
        }
    }
}

/// Final cluster assignment plus summary counts (`results.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub run_id: String,
    pub assignments: BTreeMap<String, Uuid>,
    pub decision_counts: DecisionCounts,
    pub profiles: u64,
    pub unassigned_mentions: u64,
}

struct LaneOutcome {
    counts: DecisionCounts,
    assignments: BTreeMap<String, Uuid>,
    duplicate_publications: u64,
    input_publications: u64,
    input_mentions: u64,
    warnings: IngestWarnings,
    cancelled: bool,
}

/// Runs the full pipeline over pre-grouped article records. Returns the
/// manifest on success or cancellation; fatal errors are returned after
/// the trace has been flushed and an aborted manifest written.
pub fn execute_run(
    config: &RunConfig,
    groups: Vec<ArticleGroup>,
    ingest_warnings: IngestWarnings,
    failed_dois: Vec<String>,
    paths: &RunPaths,
    cancel: &AtomicBool,
) -> Result<RunManifest> {
    let started_at = Utc::now();

    // Everything that can be a config error fails here, before any output
    // file exists.
    let thresholds = config.thresholds()?;
    let scorer = Scorer::new(config.mode, config.mu_table()?)?;
    let run_id = config.resolved_run_id();

    let mut trace = TraceLog::create(
        &paths.trace_jsonl,
        &paths.review_jsonl,
        run_id.clone(),
        config.redaction_salt.clone(),
        config.mode.as_str(),
        thresholds,
        config.seed,
    )?;

    let mut engine = DecisionEngine::new(scorer, thresholds, config.seed);
    let mut dedup = PublicationDeduplicator::new(config.title_threshold);

    let mut groups = groups;
    if let Some(limit) = config.limit {
        groups.truncate(limit);
    }

    let worker_count = config.max_workers.max(1);
    let pool = ThreadPoolBuilder::new()
        .num_threads(worker_count)
        .build()
        .context("failed to build parse worker pool")?;
    let (tx, rx) = sync_channel::<(Publication, IngestWarnings)>(worker_count * 2);
    let chunk_size = worker_count * 4;

    let lane_result = thread::scope(|scope| {
        scope.spawn(move || {
            for batch in groups.chunks(chunk_size) {
                let assembled: Vec<(Publication, IngestWarnings)> =
                    pool.install(|| batch.par_iter().map(inputs::assemble_publication).collect());
                for item in assembled {
                    // The lane hung up; stop producing.
                    if tx.send(item).is_err() {
                        return;
                    }
                }
            }
        });
        decision_lane(rx, &mut engine, &mut dedup, &mut trace, ingest_warnings, cancel)
    });

    trace.flush()?;

    let finished_at = Utc::now();
    let mut manifest = RunManifest {
        run_id: run_id.clone(),
        status: "completed".into(),
        reason: None,
        cancelled: false,
        config_hash: config.config_hash(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        seed: config.seed,
        backend: config.mode.as_str().to_string(),
        thresholds,
        input_publications: 0,
        input_mentions: 0,
        duplicate_publications: 0,
        decision_counts: DecisionCounts::default(),
        skipped_mentions: 0,
        invalid_orcids: 0,
        failed_dois,
        started_at,
        finished_at,
    };

    match lane_result {
        Ok(outcome) => {
            manifest.input_publications = outcome.input_publications;
            manifest.input_mentions = outcome.input_mentions;
            manifest.duplicate_publications = outcome.duplicate_publications;
            manifest.decision_counts = outcome.counts;
            manifest.skipped_mentions = outcome.warnings.skipped_mentions;
            manifest.invalid_orcids = outcome.warnings.invalid_orcids;
            if outcome.cancelled {
                manifest.status = "cancelled".into();
                manifest.cancelled = true;
            }
            let results = ResultsFile {
                run_id,
                assignments: outcome.assignments,
                decision_counts: outcome.counts,
                profiles: engine.index().len() as u64,
                unassigned_mentions: outcome.counts.unknown,
            };
            write_results(&paths.results, &results)?;
            manifest.persist(&paths.manifest)?;
            Ok(manifest)
        }
        Err(err) => {
            manifest.status = "aborted".into();
            manifest.reason = Some(format!("{err:#}"));
            manifest.persist(&paths.manifest)?;
            Err(err)
        }
    }
}

fn decision_lane(
    rx: Receiver<(Publication, IngestWarnings)>,
    engine: &mut DecisionEngine,
    dedup: &mut PublicationDeduplicator,
    trace: &mut TraceLog,
    ingest_warnings: IngestWarnings,
    cancel: &AtomicBool,
) -> Result<LaneOutcome> {
    let mut outcome = LaneOutcome {
        counts: DecisionCounts::default(),
        assignments: BTreeMap::new(),
        duplicate_publications: 0,
        input_publications: 0,
        input_mentions: 0,
        warnings: ingest_warnings,
        cancelled: false,
    };

    for (publication, warnings) in rx {
        // Poll before handing the publication to the lane; the previous
        // publication has fully committed by this point.
        if cancel.load(Ordering::SeqCst) {
            outcome.cancelled = true;
            break;
        }
        outcome.warnings.absorb(warnings);
        outcome.input_publications += 1;
        outcome.input_mentions += publication.mentions.len() as u64;

        if let DedupOutcome::Duplicate { .. } = dedup.check(&publication) {
            outcome.duplicate_publications += 1;
            continue;
        }
        dedup.admit(&publication);

        let decisions = engine.process_publication(&publication)?;
        for decision in &decisions {
            outcome.counts.tally(decision.decision);
            trace.commit(&publication.publication_id, decision)?;
            if let Some(author_id) = decision.resolved_author_id {
                outcome.assignments.insert(decision.mention_id.clone(), author_id);
            }
        }
    }
    Ok(outcome)
}

fn write_results(path: &Path, results: &ResultsFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let data = serde_json::to_string_pretty(results)?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
