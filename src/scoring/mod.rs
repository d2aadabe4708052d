//! Scoring backends over a comparison vector.
//!
//! The baseline backend is a fixed-weight sum of raw similarities in
//! [0,1]. The Fellegi-Sunter backend sums per-bin log-likelihood ratios
//! log2(m/u) drawn from a MU table loaded once per run; its domain is all
//! of R. Both emit the same component breakdown for the trace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::compare::{Bin, ComparisonVector, Feature};
use crate::error::RunError;

/// Baseline weights per feature. The ORCID `missing` bin contributes its
/// neutral 0.5 raw value, i.e. 0.15 of the total.
const BASELINE_WEIGHTS: [(Feature, f64); 5] = [
    (Feature::Name, 0.40),
    (Feature::Orcid, 0.30),
    (Feature::Coauthor, 0.15),
    (Feature::Journal, 0.10),
    (Feature::Affiliation, 0.05),
];

/// Stabilizing floor for the likelihood ratio.
const MU_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBackend {
    Baseline,
    FellegiSunter,
}

impl ScoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreBackend::Baseline => "baseline",
            ScoreBackend::FellegiSunter => "fs",
        }
    }
}

impl FromStr for ScoreBackend {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(ScoreBackend::Baseline),
            "fs" => Ok(ScoreBackend::FellegiSunter),
            other => Err(RunError::Config(format!(
                "unknown scoring mode '{other}' (expected 'baseline' or 'fs')"
            ))),
        }
    }
}

/// Conditional bin probabilities given match (`m`) and non-match (`u`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MuEntry {
    pub m: f64,
    pub u: f64,
}

impl MuEntry {
    pub fn llr(&self) -> f64 {
        (self.m.max(MU_EPSILON) / self.u.max(MU_EPSILON)).log2()
    }
}

const fn mu(m: f64, u: f64) -> MuEntry {
    MuEntry { m, u }
}

/// The bins a feature can produce, used to validate table coverage.
pub fn required_bins(feature: Feature) -> &'static [Bin] {
    match feature {
        Feature::Name | Feature::Affiliation => {
            &[Bin::Exact, Bin::High, Bin::Medium, Bin::Low, Bin::None]
        }
        Feature::Orcid => &[Bin::Match, Bin::Mismatch, Bin::Missing],
        Feature::Coauthor | Feature::Journal => &[Bin::High, Bin::Medium, Bin::Low, Bin::None],
    }
}

/// MU parameter table keyed by feature and bin. Loaded once per run; every
/// reachable bin must be covered or the run aborts with a config error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MuTable {
    entries: BTreeMap<String, BTreeMap<String, MuEntry>>,
}

impl MuTable {
    /// Built-in parameters used when no `--mu-table` file is given.
    pub fn builtin() -> Self {
        let mut entries: BTreeMap<String, BTreeMap<String, MuEntry>> = BTreeMap::new();
        let mut put = |feature: &str, bins: Vec<(&str, MuEntry)>| {
            entries.insert(
                feature.to_string(),
                bins.into_iter()
                    .map(|(bin, entry)| (bin.to_string(), entry))
                    .collect(),
            );
        };
        put(
            "name",
            vec![
                ("exact", mu(0.55, 0.005)),
                ("high", mu(0.30, 0.02)),
                ("medium", mu(0.10, 0.08)),
                ("low", mu(0.04, 0.25)),
                ("none", mu(0.01, 0.645)),
            ],
        );
        put(
            "orcid",
            vec![
                ("match", mu(0.40, 0.0001)),
                ("mismatch", mu(0.01, 0.30)),
                ("missing", mu(0.59, 0.6999)),
            ],
        );
        put(
            "coauthor",
            vec![
                ("high", mu(0.35, 0.01)),
                ("medium", mu(0.25, 0.04)),
                ("low", mu(0.15, 0.10)),
                ("none", mu(0.25, 0.85)),
            ],
        );
        put(
            "journal",
            vec![
                ("high", mu(0.30, 0.05)),
                ("medium", mu(0.20, 0.10)),
                ("low", mu(0.15, 0.15)),
                ("none", mu(0.35, 0.70)),
            ],
        );
        put(
            "affiliation",
            vec![
                ("exact", mu(0.25, 0.01)),
                ("high", mu(0.25, 0.03)),
                ("medium", mu(0.20, 0.10)),
                ("low", mu(0.15, 0.20)),
                ("none", mu(0.15, 0.66)),
            ],
        );
        Self { entries }
    }

    pub fn get(&self, feature: Feature, bin: Bin) -> Result<MuEntry, RunError> {
        self.entries
            .get(feature.as_str())
            .and_then(|bins| bins.get(bin.as_str()))
            .copied()
            .ok_or_else(|| {
                RunError::Config(format!(
                    "MU table missing entry for feature '{}' bin '{}'",
                    feature.as_str(),
                    bin.as_str()
                ))
            })
    }

    /// Checks that every reachable (feature, bin) pair is present and that
    /// all probabilities are in (0, 1]. Run once at startup so a sparse
    /// table fails fast instead of mid-stream.
    pub fn validate(&self) -> Result<(), RunError> {
        for feature in Feature::ALL {
            for bin in required_bins(feature) {
                let entry = self.get(feature, *bin)?;
                if !(entry.m > 0.0 && entry.m <= 1.0 && entry.u > 0.0 && entry.u <= 1.0) {
                    return Err(RunError::Config(format!(
                        "MU table entry for '{}'/'{}' out of range: m={}, u={}",
                        feature.as_str(),
                        bin.as_str(),
                        entry.m,
                        entry.u
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Per-feature slice of a total score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub raw: f64,
    pub bin: Bin,
    /// Weighted contribution: weight*raw for the baseline, log2(m/u) for
    /// Fellegi-Sunter.
    pub weighted: f64,
}

/// Total score plus the per-feature breakdown the trace records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub components: BTreeMap<Feature, ComponentScore>,
}

/// Scores comparison vectors with the backend chosen for the run.
#[derive(Debug, Clone)]
pub struct Scorer {
    backend: ScoreBackend,
    mu: MuTable,
}

impl Scorer {
    pub fn new(backend: ScoreBackend, mu: MuTable) -> Result<Self, RunError> {
        if backend == ScoreBackend::FellegiSunter {
            mu.validate()?;
        }
        Ok(Self { backend, mu })
    }

    pub fn backend(&self) -> ScoreBackend {
        self.backend
    }

    pub fn score(&self, vector: &ComparisonVector) -> Result<ScoreBreakdown, RunError> {
        let mut components = BTreeMap::new();
        let mut total = 0.0;
        match self.backend {
            ScoreBackend::Baseline => {
                for (feature, weight) in BASELINE_WEIGHTS {
                    let feature_score = vector.get(feature);
                    let weighted = weight * feature_score.value;
                    total += weighted;
                    components.insert(
                        feature,
                        ComponentScore {
                            raw: feature_score.value,
                            bin: feature_score.bin,
                            weighted,
                        },
                    );
                }
            }
            ScoreBackend::FellegiSunter => {
                for feature in Feature::ALL {
                    let feature_score = vector.get(feature);
                    let weighted = self.mu.get(feature, feature_score.bin)?.llr();
                    total += weighted;
                    components.insert(
                        feature,
                        ComponentScore {
                            raw: feature_score.value,
                            bin: feature_score.bin,
                            weighted,
                        },
                    );
                }
            }
        }
        if total.is_nan() {
            return Err(RunError::NanSimilarity("total"));
        }
        Ok(ScoreBreakdown { total, components })
    }
}
