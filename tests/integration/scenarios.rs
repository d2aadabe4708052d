use super::{mention_record, RunHarness};
use authorlink::engine::Decision;
use authorlink::error::exit_code_for;
use authorlink::inputs;
use authorlink::run::{execute_run, RunConfig};
use authorlink::scoring::ScoreBackend;
use authorlink::trace::TraceRecord;
use std::sync::atomic::AtomicBool;

const ORCID_A: &str = "0000-0001-2345-6789";
const ORCID_B: &str = "0000-0002-9999-9999";

#[test]
fn orcid_match_overrides_name_drift() {
    let harness = RunHarness::new();
    let mut config = RunConfig::for_mode(ScoreBackend::Baseline);
    config.accept_threshold = 0.60;
    let manifest = harness.run(
        &config,
        vec![
            mention_record("10.1/s1-a", "John A. Smith", Some(ORCID_A), None),
            mention_record("10.1/s1-b", "J. Smith", Some(ORCID_A), None),
        ],
    );
    assert_eq!(manifest.decision_counts.new, 1);
    assert_eq!(manifest.decision_counts.merge, 1);

    let results = harness.results();
    assert_eq!(results.profiles, 1);
    assert_eq!(
        results.assignments["10.1/s1-a#1"],
        results.assignments["10.1/s1-b#1"]
    );

    // The merge record clears the lowered accept threshold:
    // 0.40 * name(high) + 0.30 * orcid(match).
    let trace = String::from_utf8(harness.trace_bytes()).unwrap();
    let merge_line = trace
        .lines()
        .map(|line| serde_json::from_str::<TraceRecord>(line).unwrap())
        .find(|record| record.decision == Decision::Merge)
        .expect("missing merge record");
    assert!(merge_line.score_total >= 0.66 - 1e-9);
}

#[test]
fn homonym_with_conflicting_orcid_is_routed_to_review() {
    let harness = RunHarness::new();
    let config = RunConfig::for_mode(ScoreBackend::Baseline);
    let manifest = harness.run(
        &config,
        vec![
            mention_record("10.1/s2-a", "John A. Smith", Some(ORCID_A), None),
            mention_record("10.1/s2-b", "John Smith", Some(ORCID_B), None),
        ],
    );
    assert_eq!(manifest.decision_counts.unknown, 1);

    let results = harness.results();
    // The conflicting mention mutated nothing.
    assert_eq!(results.profiles, 1);
    assert!(!results.assignments.contains_key("10.1/s2-b#1"));
    assert_eq!(results.unassigned_mentions, 1);

    let review = String::from_utf8(harness.review_bytes()).unwrap();
    let records: Vec<TraceRecord> = review
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, Decision::Unknown);
    // Mid-band score: ORCID mismatch zeroes the strongest feature while
    // the near-identical name keeps the total above reject.
    assert!(records[0].score_total > 0.20 && records[0].score_total < 0.90);
}

#[test]
fn doi_duplicate_emits_no_decisions() {
    let harness = RunHarness::new();
    let config = RunConfig::for_mode(ScoreBackend::Baseline);
    let manifest = harness.run(
        &config,
        vec![
            mention_record("10.1038/x", "John Smith", None, None),
            mention_record("10.1038/x", "Wei Zhang", None, None),
            mention_record("https://doi.org/10.1038/X", "John Smith", None, None),
            mention_record("https://doi.org/10.1038/X", "Wei Zhang", None, None),
            mention_record("https://doi.org/10.1038/X", "Li Chen", None, None),
        ],
    );
    assert_eq!(manifest.input_publications, 2);
    assert_eq!(manifest.duplicate_publications, 1);
    // Only the first publication's two mentions were decided.
    assert_eq!(manifest.decision_counts.total(), 2);
    assert_eq!(harness.results().profiles, 2);
}

#[test]
fn empty_block_decides_new_directly() {
    let harness = RunHarness::new();
    let config = RunConfig::for_mode(ScoreBackend::Baseline);
    let manifest = harness.run(
        &config,
        vec![mention_record("10.1/s4", "Zhang Wei", None, None)],
    );
    assert_eq!(manifest.decision_counts.new, 1);
    assert_eq!(harness.results().profiles, 1);

    let trace = String::from_utf8(harness.trace_bytes()).unwrap();
    let record: TraceRecord = serde_json::from_str(trace.lines().next().unwrap()).unwrap();
    assert_eq!(record.decision, Decision::New);
    assert!(record.best_author_id.is_none());
    assert_eq!(record.seq, 0);
    assert_eq!(record.score_total, 0.0);
}

#[test]
fn inverted_thresholds_are_a_config_error_with_no_trace() {
    let harness = RunHarness::new();
    let mut config = RunConfig::for_mode(ScoreBackend::Baseline);
    config.accept_threshold = 0.20;
    config.reject_threshold = 0.90;
    let (groups, warnings) = inputs::group_by_article(vec![mention_record(
        "10.1/s5",
        "John Smith",
        None,
        None,
    )]);
    let err = execute_run(
        &config,
        groups,
        warnings,
        Vec::new(),
        &harness.paths(),
        &AtomicBool::new(false),
    )
    .unwrap_err();
    assert_eq!(exit_code_for(&err), 2);
    assert!(!harness.path("trace.jsonl").exists());
    assert!(!harness.path("results.json").exists());
}

#[test]
fn fellegi_sunter_mode_merges_on_strong_evidence() {
    let harness = RunHarness::new();
    let config = RunConfig::for_mode(ScoreBackend::FellegiSunter);
    let manifest = harness.run(
        &config,
        vec![
            mention_record(
                "10.1/fs-a",
                "Maria Gonzalez",
                Some(ORCID_A),
                Some("Universidad de Chile"),
            ),
            mention_record("10.1/fs-a", "Paul Erdos", None, None),
            mention_record(
                "10.1/fs-b",
                "M. Gonzalez",
                Some(ORCID_A),
                Some("Universidad de Chile"),
            ),
            mention_record("10.1/fs-b", "Paul Erdos", None, None),
        ],
    );
    assert_eq!(manifest.decision_counts.merge, 2);
    assert_eq!(manifest.decision_counts.new, 2);
    let results = harness.results();
    assert_eq!(results.profiles, 2);
    assert_eq!(
        results.assignments["10.1/fs-a#1"],
        results.assignments["10.1/fs-b#1"]
    );
    assert_eq!(
        results.assignments["10.1/fs-a#2"],
        results.assignments["10.1/fs-b#2"]
    );
}
