//! Dataset section shared by both configuration variants.

use super::ModelMode;
use crate::data::Dataset;
use crate::error::{OptbuildError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the training (and optional test) data come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV file with a header row.
    pub training_dataset_file: PathBuf,
    /// Column fed to the descriptor.
    pub input_column: String,
    /// Numeric target column.
    pub response_column: String,
    /// Optional held-out test set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_dataset_file: Option<PathBuf>,
    /// How to carve a test set out of the training file when no test file is given.
    #[serde(default)]
    pub split_strategy: SplitStrategy,
    #[serde(default)]
    pub deduplication_strategy: Deduplication,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    ','
}

/// Test-set split applied to the training file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum SplitStrategy {
    #[default]
    NoSplit,
    Random {
        fraction: f64,
        #[serde(default)]
        seed: u64,
    },
}

/// Handling of rows that share the same input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deduplication {
    #[default]
    KeepAll,
    KeepFirst,
    KeepAverage,
}

impl DataConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_column.is_empty() || self.response_column.is_empty() {
            return Err(OptbuildError::validation(
                "input_column and response_column must be non-empty",
            ));
        }
        if !self.delimiter.is_ascii() {
            return Err(OptbuildError::validation(format!(
                "delimiter '{}' is not an ASCII character",
                self.delimiter
            )));
        }
        if let SplitStrategy::Random { fraction, .. } = self.split_strategy {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(OptbuildError::validation(format!(
                    "split fraction must be in (0, 1), got {}",
                    fraction
                )));
            }
        }
        Ok(())
    }

    fn load(&self, path: &std::path::Path, mode: ModelMode) -> Result<Dataset> {
        let dataset = Dataset::load_csv(
            path,
            &self.input_column,
            &self.response_column,
            self.delimiter as u8,
        )?
        .deduplicate(self.deduplication_strategy, mode);
        if mode == ModelMode::Classification {
            dataset.check_binary()?;
        }
        Ok(dataset)
    }

    /// Load the training set and, if available, the test set.
    ///
    /// A random split only applies when no explicit test file is configured.
    pub fn load_sets(&self, mode: ModelMode) -> Result<(Dataset, Option<Dataset>)> {
        self.validate()?;
        let train = self.load(&self.training_dataset_file, mode)?;

        match (&self.test_dataset_file, &self.split_strategy) {
            (Some(test_path), _) => {
                let test = self.load(test_path, mode)?;
                tracing::debug!(train = train.len(), test = test.len(), "Loaded datasets");
                Ok((train, Some(test)))
            }
            (None, SplitStrategy::Random { fraction, seed }) => {
                let (train, test) = train.split_random(*fraction, *seed)?;
                tracing::debug!(
                    train = train.len(),
                    test = test.len(),
                    "Split training file into train and test sets"
                );
                Ok((train, Some(test)))
            }
            (None, SplitStrategy::NoSplit) => {
                tracing::debug!(train = train.len(), "Loaded training set without test set");
                Ok((train, None))
            }
        }
    }

    /// Load only the training portion, as seen by the optimizer.
    /// An explicit test file is not read.
    pub fn load_training(&self, mode: ModelMode) -> Result<Dataset> {
        match (&self.test_dataset_file, &self.split_strategy) {
            (None, SplitStrategy::Random { .. }) => Ok(self.load_sets(mode)?.0),
            _ => {
                self.validate()?;
                self.load(&self.training_dataset_file, mode)
            }
        }
    }

    /// Training and test data combined into one set.
    pub fn load_merged(&self, mode: ModelMode) -> Result<Dataset> {
        let (train, test) = self.load_sets(mode)?;
        Ok(match test {
            Some(test) => train.merge(&test),
            None => train,
        })
    }
}
