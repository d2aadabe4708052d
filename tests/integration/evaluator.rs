use super::{mention_record, RunHarness};
use authorlink::eval::{build_gold_set, evaluate};
use authorlink::inputs::{self, RawMentionRecord};
use authorlink::run::RunConfig;
use authorlink::scoring::ScoreBackend;
use std::collections::BTreeMap;

const ORCID_A: &str = "0000-0001-2345-6789";
const ORCID_B: &str = "0000-0002-9999-9999";
const ORCID_C: &str = "0000-0003-1111-2222";

/// Three ORCID-bearing authors spread over four publications, plus one
/// ORCID-free walk-on who never enters the gold set.
fn corpus() -> Vec<RawMentionRecord> {
    vec![
        mention_record("10.1/e1", "Alice Archer", Some(ORCID_A), Some("MIT")),
        mention_record("10.1/e1", "Boris Volkov", Some(ORCID_B), None),
        mention_record("10.1/e2", "A. Archer", Some(ORCID_A), Some("MIT")),
        mention_record("10.1/e2", "Chen Lu", Some(ORCID_C), None),
        mention_record("10.1/e3", "B. Volkov", Some(ORCID_B), None),
        mention_record("10.1/e3", "Chen Lu", Some(ORCID_C), None),
        mention_record("10.1/e4", "Alice Archer", Some(ORCID_A), Some("MIT")),
        mention_record("10.1/e4", "Derek Walkon", None, None),
    ]
}

#[test]
fn gold_set_covers_repeated_orcids_only() {
    let (groups, _) = inputs::group_by_article(corpus());
    let (publications, _) = inputs::assemble_all(&groups);
    let gold = build_gold_set(&publications, 2);
    // 3 + 2 + 2 gold mentions; the ORCID-free mention is absent.
    assert_eq!(gold.len(), 7);
    assert!(!gold.contains_key("10.1/e4#2"));
    assert_eq!(gold["10.1/e1#1"], ORCID_A);
    assert_eq!(gold["10.1/e4#1"], ORCID_A);
}

#[test]
fn orcid_driven_run_scores_perfectly_against_gold() {
    let harness = RunHarness::new();
    let config = RunConfig::for_mode(ScoreBackend::FellegiSunter);
    harness.run(&config, corpus());
    let results = harness.results();

    let (groups, _) = inputs::group_by_article(corpus());
    let (publications, _) = inputs::assemble_all(&groups);
    let gold = build_gold_set(&publications, 2);

    let predicted: BTreeMap<String, String> = results
        .assignments
        .iter()
        .map(|(mention, author)| (mention.clone(), author.to_string()))
        .collect();
    let report = evaluate(&predicted, &gold);

    // The walk-on mention is predicted-only; every gold mention resolved.
    assert_eq!(report.gold_only, 0);
    assert_eq!(report.predicted_only, 1);
    assert_eq!(report.evaluated_mentions, 7);
    assert_eq!(report.pairwise.f1, 1.0);
    assert_eq!(report.b_cubed.f1, 1.0);
}

#[test]
fn over_merging_costs_precision_not_recall() {
    let (groups, _) = inputs::group_by_article(corpus());
    let (publications, _) = inputs::assemble_all(&groups);
    let gold = build_gold_set(&publications, 2);

    // Collapse everything into a single predicted cluster.
    let predicted: BTreeMap<String, String> = gold
        .keys()
        .map(|mention| (mention.clone(), "everyone".to_string()))
        .collect();
    let report = evaluate(&predicted, &gold);
    assert_eq!(report.pairwise.recall, 1.0);
    assert!(report.pairwise.precision < 0.5);
    assert_eq!(report.b_cubed.recall, 1.0);
    assert!(report.b_cubed.precision < 0.6);
}
