pub mod compare;
pub mod dedup;
pub mod engine;
pub mod entities;
pub mod error;
pub mod eval;
pub mod index;
pub mod inputs;
pub mod normalize;
pub mod run;
pub mod scoring;
pub mod trace;

// Re-export commonly used types for convenience.
pub use engine::{Decision, DecisionEngine, Thresholds};
pub use entities::{AuthorMention, AuthorProfile, Publication};
pub use error::RunError;
pub use index::AuthorIndex;
pub use run::{execute_run, ResultsFile, RunConfig, RunPaths};
pub use scoring::{MuTable, ScoreBackend, Scorer};
pub use trace::{RunManifest, TraceLog};
