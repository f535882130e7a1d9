//! Build configuration: one concrete descriptor and algorithm to train.

use super::{DataConfig, Direction, ModelMode};
use crate::descriptors::Descriptor;
use crate::error::{OptbuildError, Result};
use crate::estimators::Algorithm;
use crate::metrics::Scoring;
use serde::{Deserialize, Serialize};

/// Marker for the `"task": "building"` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildTask {
    #[default]
    #[serde(rename = "building")]
    Building,
}

/// Provenance of a build config produced by an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetadata {
    /// Study name (the absolute path of the optimization config).
    pub name: String,
    pub cross_validation: usize,
    pub shuffle: bool,
    pub best_trial: usize,
    pub best_value: f64,
    pub n_trials: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    pub mode: ModelMode,
    #[serde(default)]
    pub scoring: Option<Scoring>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub n_trials: Option<usize>,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl BuildSettings {
    pub fn effective_scoring(&self) -> Scoring {
        self.scoring.unwrap_or_else(|| Scoring::default_for(self.mode))
    }
}

/// A single model to train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub task: BuildTask,
    pub data: DataConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BuildMetadata>,
    pub descriptor: Descriptor,
    pub algorithm: Algorithm,
    pub settings: BuildSettings,
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.descriptor.validate()?;
        self.algorithm.validate()?;
        let mode = self.settings.mode;
        if self.algorithm.mode() != mode {
            return Err(OptbuildError::validation(format!(
                "algorithm {} does not support {} mode",
                self.algorithm.name(),
                mode
            )));
        }
        let scoring = self.settings.effective_scoring();
        if scoring.mode() != mode {
            return Err(OptbuildError::validation(format!(
                "scoring {} does not apply to {} mode",
                scoring, mode
            )));
        }
        Ok(())
    }

    /// Human-readable model name for logs and bundle manifests.
    pub fn model_name(&self) -> String {
        format!("{}+{}", self.descriptor.name(), self.algorithm.name())
    }
}
