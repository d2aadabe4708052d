use authorlink::dedup::{DedupOutcome, PublicationDeduplicator};
use authorlink::entities::Publication;
use authorlink::eval::evaluate;
use authorlink::normalize::{is_valid_orcid, normalize_doi, normalize_name, normalize_title};
use proptest::prelude::*;
use std::collections::BTreeMap;

proptest! {
    #[test]
    fn title_normalization_is_idempotent(title in "\\PC{0,80}") {
        let once = normalize_title(&title);
        prop_assert_eq!(normalize_title(&once), once);
    }

    #[test]
    fn name_normalization_is_idempotent(name in "\\PC{0,60}") {
        let once = normalize_name(&name);
        prop_assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn doi_normalization_is_idempotent(doi in "\\PC{0,60}") {
        if let Some(once) = normalize_doi(&doi) {
            prop_assert_eq!(normalize_doi(&once), Some(once));
        }
    }

    #[test]
    fn generated_orcids_validate(a in 0u32..10000, b in 0u32..10000, c in 0u32..10000, d in 0u32..1000, check in 0u32..11) {
        let last = if check == 10 { "X".to_string() } else { check.to_string() };
        let orcid = format!("{a:04}-{b:04}-{c:04}-{d:03}{last}");
        prop_assert!(is_valid_orcid(&orcid));
    }

    #[test]
    fn dedup_readmission_is_idempotent(title in "[a-zA-Z ]{5,60}", doi in "[a-z0-9./]{4,20}") {
        let doi = format!("10.{doi}");
        let publication = Publication::new(
            "p1",
            Some(doi.as_str()),
            title,
            Some(2020),
            None,
            Vec::new(),
        );
        let mut dedup = PublicationDeduplicator::default();
        prop_assert_eq!(dedup.check(&publication), DedupOutcome::Admit);
        dedup.admit(&publication);
        let size = dedup.len();
        // A second submission is reported as a duplicate and admitting it
        // again changes nothing.
        let is_duplicate = matches!(dedup.check(&publication), DedupOutcome::Duplicate { .. });
        prop_assert!(is_duplicate);
        dedup.admit(&publication);
        prop_assert_eq!(dedup.len(), size);
    }

    #[test]
    fn self_evaluation_is_perfect(labels in proptest::collection::vec(0usize..5, 1..40)) {
        let assignment: BTreeMap<String, String> = labels
            .iter()
            .enumerate()
            .map(|(i, cluster)| (format!("m{i}"), format!("c{cluster}")))
            .collect();
        let report = evaluate(&assignment, &assignment);
        prop_assert_eq!(report.pairwise.f1, 1.0);
        prop_assert_eq!(report.b_cubed.f1, 1.0);
        prop_assert_eq!(report.predicted_only, 0);
        prop_assert_eq!(report.gold_only, 0);
    }

    #[test]
    fn singleton_prediction_never_has_pairwise_recall(labels in proptest::collection::vec(0usize..3, 4..30)) {
        let gold: BTreeMap<String, String> = labels
            .iter()
            .enumerate()
            .map(|(i, cluster)| (format!("m{i}"), format!("c{cluster}")))
            .collect();
        let singletons: BTreeMap<String, String> = gold
            .keys()
            .map(|mention| (mention.clone(), format!("solo-{mention}")))
            .collect();
        let report = evaluate(&singletons, &gold);
        if report.pairwise.false_negatives > 0 {
            prop_assert_eq!(report.pairwise.recall, 0.0);
        }
    }
}
