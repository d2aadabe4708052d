use thiserror::Error;
use uuid::Uuid;

/// Process exit code used when a run is cancelled from the outside.
pub const EXIT_CANCELLED: i32 = 130;

/// Fatal error kinds. Everything else in the crate is either plumbing
/// (`anyhow` with context) or a non-fatal data-quality finding that is
/// counted in the manifest instead of raised.
#[derive(Debug, Error)]
pub enum RunError {
    /// Invalid configuration: unknown mode, inverted thresholds, missing
    /// MU-table bin. Exit code 2.
    #[error("configuration error: {0}")]
    Config(String),

    /// A NEW decision would introduce a second profile with an ORCID the
    /// index already holds. The input data contradicts itself; exit code 3.
    #[error("ORCID {orcid} already belongs to profile {existing}")]
    DuplicateOrcid { orcid: String, existing: Uuid },

    /// Two inserts carried the same author id. Profile ids come from the
    /// run's RNG, so a collision means corrupted state; exit code 3.
    #[error("author id {0} already present in the index")]
    DuplicateAuthorId(Uuid),

    /// A comparator produced NaN. Treated as a bug in the comparison
    /// pipeline rather than coerced into a score; exit code 3.
    #[error("comparator for feature '{0}' produced NaN")]
    NanSimilarity(&'static str),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) => 2,
            RunError::DuplicateOrcid { .. }
            | RunError::DuplicateAuthorId(_)
            | RunError::NanSimilarity(_) => 3,
        }
    }
}

/// Maps any error chain to the driver exit code: typed fatals carry their
/// own code, everything else is a generic failure.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<RunError>() {
        Some(run_err) => run_err.exit_code(),
        None => 1,
    }
}
