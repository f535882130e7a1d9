//! Optimization configuration: the hyperparameter search space and its settings.

use super::{DataConfig, Direction, ModelMode};
use crate::descriptors::Descriptor;
use crate::error::{OptbuildError, Result};
use crate::estimators::{Algorithm, Weights};
use crate::metrics::Scoring;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Marker for the `"task": "optimization"` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationTask {
    #[default]
    #[serde(rename = "optimization")]
    Optimization,
}

/// Inclusive float range, optionally sampled on a log scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub low: f64,
    pub high: f64,
    #[serde(default)]
    pub log: bool,
}

impl FloatRange {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.low == self.high {
            return self.low;
        }
        if self.log {
            let (lo, hi) = (self.low.ln(), self.high.ln());
            rng.gen_range(lo..=hi).exp().clamp(self.low, self.high)
        } else {
            rng.gen_range(self.low..=self.high)
        }
    }

    fn validate(&self, what: &str) -> Result<()> {
        if !(self.low.is_finite() && self.high.is_finite()) || self.low > self.high {
            return Err(OptbuildError::validation(format!(
                "{}: invalid range [{}, {}]",
                what, self.low, self.high
            )));
        }
        if self.log && self.low <= 0.0 {
            return Err(OptbuildError::validation(format!(
                "{}: log-scaled range needs a positive lower bound, got {}",
                what, self.low
            )));
        }
        Ok(())
    }
}

/// Inclusive integer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub low: usize,
    pub high: usize,
}

impl IntRange {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        rng.gen_range(self.low..=self.high)
    }

    fn validate(&self, what: &str) -> Result<()> {
        if self.low > self.high {
            return Err(OptbuildError::validation(format!(
                "{}: invalid range [{}, {}]",
                what, self.low, self.high
            )));
        }
        Ok(())
    }
}

fn all_weights() -> Vec<Weights> {
    vec![Weights::Uniform, Weights::Distance]
}

/// One algorithm family and the ranges its hyperparameters are drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "parameters")]
pub enum AlgorithmSpace {
    Ridge {
        alpha: FloatRange,
    },
    Lasso {
        alpha: FloatRange,
    },
    KNeighborsRegressor {
        n_neighbors: IntRange,
        #[serde(default = "all_weights")]
        weights: Vec<Weights>,
    },
    LogisticRegression {
        c: FloatRange,
    },
    KNeighborsClassifier {
        n_neighbors: IntRange,
        #[serde(default = "all_weights")]
        weights: Vec<Weights>,
    },
}

impl AlgorithmSpace {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ridge { .. } => "Ridge",
            Self::Lasso { .. } => "Lasso",
            Self::KNeighborsRegressor { .. } => "KNeighborsRegressor",
            Self::LogisticRegression { .. } => "LogisticRegression",
            Self::KNeighborsClassifier { .. } => "KNeighborsClassifier",
        }
    }

    pub fn mode(&self) -> ModelMode {
        match self {
            Self::Ridge { .. } | Self::Lasso { .. } | Self::KNeighborsRegressor { .. } => {
                ModelMode::Regression
            }
            Self::LogisticRegression { .. } | Self::KNeighborsClassifier { .. } => {
                ModelMode::Classification
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name();
        match self {
            Self::Ridge { alpha } | Self::Lasso { alpha } => {
                alpha.validate(&format!("{}.alpha", name))?;
                if alpha.low < 0.0 {
                    return Err(OptbuildError::validation(format!(
                        "{}.alpha must be non-negative",
                        name
                    )));
                }
                Ok(())
            }
            Self::LogisticRegression { c } => {
                c.validate(&format!("{}.c", name))?;
                if c.low <= 0.0 {
                    return Err(OptbuildError::validation(format!(
                        "{}.c must be positive",
                        name
                    )));
                }
                Ok(())
            }
            Self::KNeighborsRegressor {
                n_neighbors,
                weights,
            }
            | Self::KNeighborsClassifier {
                n_neighbors,
                weights,
            } => {
                n_neighbors.validate(&format!("{}.n_neighbors", name))?;
                if n_neighbors.low == 0 {
                    return Err(OptbuildError::validation(format!(
                        "{}.n_neighbors must be at least 1",
                        name
                    )));
                }
                if weights.is_empty() {
                    return Err(OptbuildError::validation(format!(
                        "{}.weights must list at least one choice",
                        name
                    )));
                }
                Ok(())
            }
        }
    }

    /// Draw a concrete [`Algorithm`] from this space.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Algorithm {
        match self {
            Self::Ridge { alpha } => Algorithm::Ridge {
                alpha: alpha.sample(rng),
            },
            Self::Lasso { alpha } => Algorithm::Lasso {
                alpha: alpha.sample(rng),
            },
            Self::LogisticRegression { c } => Algorithm::LogisticRegression { c: c.sample(rng) },
            Self::KNeighborsRegressor {
                n_neighbors,
                weights,
            } => Algorithm::KNeighborsRegressor {
                n_neighbors: n_neighbors.sample(rng),
                weights: weights.choose(rng).copied().unwrap_or_default(),
            },
            Self::KNeighborsClassifier {
                n_neighbors,
                weights,
            } => Algorithm::KNeighborsClassifier {
                n_neighbors: n_neighbors.sample(rng),
                weights: weights.choose(rng).copied().unwrap_or_default(),
            },
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSettings {
    pub mode: ModelMode,
    /// Number of cross-validation folds.
    #[serde(default = "default_cross_validation")]
    pub cross_validation: usize,
    /// Shuffle rows before assigning folds.
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default = "default_n_trials")]
    pub n_trials: usize,
    #[serde(default)]
    pub direction: Direction,
    /// Defaults to the mode's standard scorer when absent.
    #[serde(default)]
    pub scoring: Option<Scoring>,
    /// Seed for sampling and fold assignment; drawn from entropy when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_cross_validation() -> usize {
    5
}

fn default_n_trials() -> usize {
    100
}

impl OptimizationSettings {
    pub fn effective_scoring(&self) -> Scoring {
        self.scoring.unwrap_or_else(|| Scoring::default_for(self.mode))
    }
}

/// Hyperparameter search over descriptors and algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    #[serde(default)]
    pub task: OptimizationTask,
    pub data: DataConfig,
    pub descriptors: Vec<Descriptor>,
    pub algorithms: Vec<AlgorithmSpace>,
    pub settings: OptimizationSettings,
}

impl OptimizationConfig {
    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        if self.descriptors.is_empty() {
            return Err(OptbuildError::validation("at least one descriptor is required"));
        }
        if self.algorithms.is_empty() {
            return Err(OptbuildError::validation("at least one algorithm is required"));
        }
        self.descriptors.iter().try_for_each(Descriptor::validate)?;

        let mode = self.settings.mode;
        for algorithm in &self.algorithms {
            algorithm.validate()?;
            if algorithm.mode() != mode {
                return Err(OptbuildError::validation(format!(
                    "algorithm {} does not support {} mode",
                    algorithm.name(),
                    mode
                )));
            }
        }

        let scoring = self.settings.effective_scoring();
        if scoring.mode() != mode {
            return Err(OptbuildError::validation(format!(
                "scoring {} does not apply to {} mode",
                scoring, mode
            )));
        }
        if self.settings.cross_validation < 2 {
            return Err(OptbuildError::validation(format!(
                "cross_validation must be at least 2, got {}",
                self.settings.cross_validation
            )));
        }
        if self.settings.n_trials == 0 {
            return Err(OptbuildError::validation("n_trials must be at least 1"));
        }
        Ok(())
    }
}
