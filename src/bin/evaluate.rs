use anyhow::{Context, Result};
use authorlink::eval::{build_gold_set, evaluate, DEFAULT_MIN_MENTIONS};
use authorlink::inputs;
use authorlink::run::ResultsFile;
use clap::Parser;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Scores a disambiguation run against the ORCID gold set of its corpus.
#[derive(Debug, Parser)]
#[command(name = "evaluate", version)]
struct Args {
    /// The corpus the run consumed.
    #[arg(long)]
    crossref_authors: PathBuf,

    /// The run's results.json.
    #[arg(long)]
    results: PathBuf,

    /// Minimum mentions per ORCID for gold membership.
    #[arg(long, default_value_t = DEFAULT_MIN_MENTIONS)]
    min_mentions: usize,

    /// Optional destination for the JSON report.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let records = inputs::load_crossref_authors(&args.crossref_authors)?;
    let (groups, _) = inputs::group_by_article(records);
    let (publications, _) = inputs::assemble_all(&groups);
    let gold = build_gold_set(&publications, args.min_mentions);

    let results: ResultsFile = serde_json::from_str(
        &fs::read_to_string(&args.results)
            .with_context(|| format!("failed to read {}", args.results.display()))?,
    )
    .with_context(|| format!("failed to parse {}", args.results.display()))?;
    let predicted: BTreeMap<String, String> = results
        .assignments
        .iter()
        .map(|(mention_id, author_id)| (mention_id.clone(), author_id.to_string()))
        .collect();

    let report = evaluate(&predicted, &gold);
    if args.verbose {
        println!(
            "evaluated {} mentions ({} predicted-only, {} gold-only excluded)",
            report.evaluated_mentions, report.predicted_only, report.gold_only
        );
    }
    println!(
        "pairwise: precision {:.4} recall {:.4} f1 {:.4} (tp {} fp {} fn {})",
        report.pairwise.precision,
        report.pairwise.recall,
        report.pairwise.f1,
        report.pairwise.true_positives,
        report.pairwise.false_positives,
        report.pairwise.false_negatives,
    );
    println!(
        "b-cubed: precision {:.4} recall {:.4} f1 {:.4}",
        report.b_cubed.precision, report.b_cubed.recall, report.b_cubed.f1
    );

    if let Some(path) = &args.output {
        let data = serde_json::to_string_pretty(&report)?;
        fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
