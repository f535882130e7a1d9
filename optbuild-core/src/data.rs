//! In-memory datasets loaded from CSV files.

use crate::config::{Deduplication, ModelMode};
use crate::error::{OptbuildError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::path::Path;

/// Paired inputs and responses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub inputs: Vec<String>,
    pub responses: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Read two named columns from a delimited file with a header row.
    ///
    /// Rows with an empty input or response are skipped. A response that is
    /// neither numeric nor a boolean is an error.
    pub fn load_csv(
        path: &Path,
        input_column: &str,
        response_column: &str,
        delimiter: u8,
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                OptbuildError::dataset(format!(
                    "column '{}' not found in {}",
                    name,
                    path.display()
                ))
            })
        };
        let input_idx = column(input_column)?;
        let response_idx = column(response_column)?;

        let mut inputs = Vec::new();
        let mut responses = Vec::new();
        let mut skipped = 0usize;
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let input = record.get(input_idx).unwrap_or_default();
            let raw = record.get(response_idx).unwrap_or_default();
            if input.is_empty() || raw.is_empty() {
                skipped += 1;
                continue;
            }
            let response = parse_response(raw).ok_or_else(|| {
                OptbuildError::dataset(format!(
                    "{}: row {}: cannot parse response '{}'",
                    path.display(),
                    row + 1,
                    raw
                ))
            })?;
            inputs.push(input.to_string());
            responses.push(response);
        }

        if skipped > 0 {
            tracing::warn!(path = %path.display(), skipped, "Skipped rows with missing values");
        }
        if inputs.is_empty() {
            return Err(OptbuildError::dataset(format!(
                "no usable rows in {}",
                path.display()
            )));
        }
        Ok(Self { inputs, responses })
    }

    /// Rows of `self` followed by the rows of `other`.
    pub fn merge(&self, other: &Dataset) -> Dataset {
        let mut merged = self.clone();
        merged.inputs.extend(other.inputs.iter().cloned());
        merged.responses.extend(other.responses.iter().copied());
        merged
    }

    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            inputs: indices.iter().map(|&i| self.inputs[i].clone()).collect(),
            responses: indices.iter().map(|&i| self.responses[i]).collect(),
        }
    }

    /// Collapse rows sharing an input, keeping first-appearance order.
    pub fn deduplicate(self, strategy: Deduplication, mode: ModelMode) -> Dataset {
        if strategy == Deduplication::KeepAll {
            return self;
        }

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
        for (input, response) in self.inputs.into_iter().zip(self.responses) {
            groups
                .entry(input.clone())
                .or_insert_with(|| {
                    order.push(input);
                    Vec::new()
                })
                .push(response);
        }

        let responses = order
            .iter()
            .map(|input| {
                let values = &groups[input];
                match strategy {
                    Deduplication::KeepAverage => {
                        let mean = values.iter().sum::<f64>() / values.len() as f64;
                        match mode {
                            ModelMode::Regression => mean,
                            ModelMode::Classification => {
                                if mean >= 0.5 {
                                    1.0
                                } else {
                                    0.0
                                }
                            }
                        }
                    }
                    _ => values[0],
                }
            })
            .collect();

        Dataset {
            inputs: order,
            responses,
        }
    }

    /// Shuffle with `seed` and hold out `fraction` of the rows.
    ///
    /// Returns `(train, test)`; both sides keep at least one row.
    pub fn split_random(&self, fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        let n = self.len();
        let n_test = ((n as f64) * fraction).round() as usize;
        if n_test == 0 || n_test >= n {
            return Err(OptbuildError::dataset(format!(
                "cannot hold out fraction {} of {} rows",
                fraction, n
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test_idx, train_idx) = indices.split_at(n_test);
        Ok((self.subset(train_idx), self.subset(test_idx)))
    }

    /// Classification responses must be exactly 0 or 1.
    pub fn check_binary(&self) -> Result<()> {
        match self.responses.iter().find(|&&r| r != 0.0 && r != 1.0) {
            Some(value) => Err(OptbuildError::dataset(format!(
                "classification responses must be 0/1 or true/false, found {}",
                value
            ))),
            None => Ok(()),
        }
    }
}

fn parse_response(raw: &str) -> Option<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(1.0),
        "false" => Some(0.0),
        other => other.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}
