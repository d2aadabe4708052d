use authorlink::inputs::{self, RawMentionRecord};
use authorlink::run::{execute_run, ResultsFile, RunConfig, RunPaths};
use authorlink::trace::RunManifest;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

mod determinism;
mod evaluator;
mod properties;
mod scenarios;

/// Shared fixture: a temp workspace plus helpers to drive a full run
/// through the library pipeline.
pub struct RunHarness {
    workspace: TempDir,
}

impl RunHarness {
    pub fn new() -> Self {
        Self {
            workspace: TempDir::new().expect("failed to create temp workspace"),
        }
    }

    pub fn paths(&self) -> RunPaths {
        RunPaths::for_output(&self.workspace.path().join("results.json"))
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.workspace.path().join(file)
    }

    pub fn run(&self, config: &RunConfig, records: Vec<RawMentionRecord>) -> RunManifest {
        let (groups, warnings) = inputs::group_by_article(records);
        execute_run(
            config,
            groups,
            warnings,
            Vec::new(),
            &self.paths(),
            &AtomicBool::new(false),
        )
        .expect("run failed")
    }

    pub fn trace_bytes(&self) -> Vec<u8> {
        std::fs::read(self.path("trace.jsonl")).expect("missing trace.jsonl")
    }

    pub fn review_bytes(&self) -> Vec<u8> {
        std::fs::read(self.path("review.jsonl")).expect("missing review.jsonl")
    }

    pub fn results(&self) -> ResultsFile {
        let data =
            std::fs::read_to_string(self.path("results.json")).expect("missing results.json");
        serde_json::from_str(&data).expect("invalid results.json")
    }
}

pub fn mention_record(
    article: &str,
    name: &str,
    orcid: Option<&str>,
    affiliation: Option<&str>,
) -> RawMentionRecord {
    RawMentionRecord {
        article_id: Some(article.into()),
        original_name: Some(name.into()),
        lastname: None,
        firstname: None,
        orcid: orcid.map(str::to_string),
        affiliation: affiliation.map(str::to_string),
    }
}
