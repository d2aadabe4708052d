use anyhow::Result;
use authorlink::error::{exit_code_for, EXIT_CANCELLED};
use authorlink::inputs;
use authorlink::normalize::normalize_doi;
use authorlink::run::{execute_run, RunConfig, RunPaths};
use authorlink::scoring::ScoreBackend;
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Incremental author name disambiguation over a bibliographic corpus.
#[derive(Debug, Parser)]
#[command(name = "disambiguate", version)]
struct Args {
    /// JSON array of raw Crossref author mention records.
    #[arg(long)]
    crossref_authors: PathBuf,

    /// JSON array of DOI strings handed to the upstream fetcher.
    #[arg(long)]
    dois: Option<PathBuf>,

    /// MU parameter table for Fellegi-Sunter mode (built-in when absent).
    #[arg(long)]
    mu_table: Option<PathBuf>,

    /// Scoring backend: "baseline" or "fs".
    #[arg(long, default_value = "baseline")]
    mode: String,

    /// Merge threshold (defaults depend on the mode).
    #[arg(long)]
    accept_threshold: Option<f64>,

    /// New-profile threshold (defaults depend on the mode).
    #[arg(long)]
    reject_threshold: Option<f64>,

    /// Fuzzy title dedup threshold.
    #[arg(long)]
    title_threshold: Option<f64>,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Run identifier; derived from the seed when omitted.
    #[arg(long)]
    run_id: Option<String>,

    /// Process at most this many publications.
    #[arg(long)]
    limit: Option<usize>,

    /// Parse worker pool size.
    #[arg(long)]
    max_workers: Option<usize>,

    /// Decision trace destination (defaults next to --output).
    #[arg(long)]
    trace_jsonl: Option<PathBuf>,

    /// Review queue destination (defaults next to --output).
    #[arg(long)]
    review_jsonl: Option<PathBuf>,

    /// Cluster assignment destination.
    #[arg(long, default_value = "results.json")]
    output: PathBuf,

    #[arg(long)]
    verbose: bool,

    #[arg(long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("disambiguate: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn run(args: &Args) -> Result<i32> {
    let mode: ScoreBackend = args.mode.parse()?;
    let mut config = RunConfig::for_mode(mode);
    if let Some(accept) = args.accept_threshold {
        config.accept_threshold = accept;
    }
    if let Some(reject) = args.reject_threshold {
        config.reject_threshold = reject;
    }
    if let Some(title) = args.title_threshold {
        config.title_threshold = title;
    }
    if let Some(workers) = args.max_workers {
        config.max_workers = workers;
    }
    config.seed = args.seed;
    config.mu_table_path = args.mu_table.clone();
    config.limit = args.limit;
    config.run_id = args.run_id.clone();

    let records = inputs::load_crossref_authors(&args.crossref_authors)?;
    let (groups, warnings) = inputs::group_by_article(records);
    if args.debug {
        println!(
            "loaded {} mention records across {} publications",
            groups.iter().map(|g| g.records.len()).sum::<usize>(),
            groups.len()
        );
    }

    // DOIs the fetcher was asked for but that produced no records are
    // attributed to the fetcher, not the decision lane.
    let failed_dois = match &args.dois {
        Some(path) => {
            let requested = inputs::load_dois(path)?;
            let known: BTreeSet<String> = groups
                .iter()
                .filter_map(|g| normalize_doi(&g.article_id))
                .filter(|d| d.starts_with("10."))
                .collect();
            requested
                .into_iter()
                .filter(|doi| !known.contains(doi))
                .collect()
        }
        None => Vec::new(),
    };

    let mut paths = RunPaths::for_output(&args.output);
    if let Some(trace) = &args.trace_jsonl {
        paths.trace_jsonl = trace.clone();
    }
    if let Some(review) = &args.review_jsonl {
        paths.review_jsonl = review.clone();
    }

    let cancel = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&cancel))?;

    let manifest = execute_run(&config, groups, warnings, failed_dois, &paths, &cancel)?;

    if args.verbose || args.debug {
        println!(
            "run {} {}: {} publications ({} duplicates), {} decisions (merge {}, new {}, unknown {}), {} profiles-affecting warnings",
            manifest.run_id,
            manifest.status,
            manifest.input_publications,
            manifest.duplicate_publications,
            manifest.decision_counts.total(),
            manifest.decision_counts.merge,
            manifest.decision_counts.new,
            manifest.decision_counts.unknown,
            manifest.skipped_mentions + manifest.invalid_orcids,
        );
        println!("outputs written next to {}", paths.results.display());
    }

    Ok(if manifest.cancelled { EXIT_CANCELLED } else { 0 })
}
