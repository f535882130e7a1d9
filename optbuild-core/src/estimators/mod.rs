//! Estimators: concrete algorithm choices and their fitted models.

pub mod linear;
pub mod neighbors;

pub use linear::LinearModel;
pub use neighbors::{NeighborsModel, Weights};

use crate::config::ModelMode;
use crate::error::{OptbuildError, Result};
use serde::{Deserialize, Serialize};

/// A concrete algorithm with fixed hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "parameters")]
pub enum Algorithm {
    Ridge {
        alpha: f64,
    },
    Lasso {
        alpha: f64,
    },
    KNeighborsRegressor {
        n_neighbors: usize,
        #[serde(default)]
        weights: Weights,
    },
    LogisticRegression {
        c: f64,
    },
    KNeighborsClassifier {
        n_neighbors: usize,
        #[serde(default)]
        weights: Weights,
    },
}

impl Algorithm {
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
        let ok = match self {
            Self::Ridge { alpha } | Self::Lasso { alpha } => alpha.is_finite() && *alpha >= 0.0,
            Self::LogisticRegression { c } => c.is_finite() && *c > 0.0,
            Self::KNeighborsRegressor { n_neighbors, .. }
            | Self::KNeighborsClassifier { n_neighbors, .. } => *n_neighbors >= 1,
        };
        if ok {
            Ok(())
        } else {
            Err(OptbuildError::validation(format!(
                "invalid hyperparameters for {}: {:?}",
                self.name(),
                self
            )))
        }
    }

    /// Fit on a design matrix `x` (one row per sample) and responses `y`.
    pub fn fit(&self, x: &[Vec<f64>], y: &[f64]) -> Result<FittedEstimator> {
        check_design(x, y)?;
        match self {
            Self::Ridge { alpha } => Ok(FittedEstimator::Linear(linear::fit_ridge(x, y, *alpha)?)),
            Self::Lasso { alpha } => Ok(FittedEstimator::Linear(linear::fit_lasso(x, y, *alpha))),
            Self::LogisticRegression { c } => {
                Ok(FittedEstimator::Logistic(linear::fit_logistic(x, y, *c)))
            }
            Self::KNeighborsRegressor {
                n_neighbors,
                weights,
            }
            | Self::KNeighborsClassifier {
                n_neighbors,
                weights,
            } => Ok(FittedEstimator::Neighbors(NeighborsModel::fit(
                x,
                y,
                *n_neighbors,
                *weights,
                self.mode(),
            ))),
        }
    }
}

fn check_design(x: &[Vec<f64>], y: &[f64]) -> Result<()> {
    if x.is_empty() {
        return Err(OptbuildError::training("cannot fit on an empty dataset"));
    }
    if x.len() != y.len() {
        return Err(OptbuildError::training(format!(
            "{} rows but {} responses",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 || x.iter().any(|row| row.len() != width) {
        return Err(OptbuildError::training("design matrix rows must share a non-zero width"));
    }
    Ok(())
}

/// A trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedEstimator {
    Linear(LinearModel),
    Logistic(LinearModel),
    Neighbors(NeighborsModel),
}

impl FittedEstimator {
    pub fn mode(&self) -> ModelMode {
        match self {
            Self::Linear(_) => ModelMode::Regression,
            Self::Logistic(_) => ModelMode::Classification,
            Self::Neighbors(model) => model.mode,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Self::Linear(model) | Self::Logistic(model) => model.coef.len(),
            Self::Neighbors(model) => model.n_features(),
        }
    }

    /// Predicted values; for classifiers, the probability of class 1.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        let width = self.n_features();
        if let Some(row) = x.iter().find(|row| row.len() != width) {
            return Err(OptbuildError::training(format!(
                "model expects {} features, got {}",
                width,
                row.len()
            )));
        }
        Ok(x.iter()
            .map(|row| match self {
                Self::Linear(model) => model.decision(row),
                Self::Logistic(model) => linear::sigmoid(model.decision(row)),
                Self::Neighbors(model) => model.predict_one(row),
            })
            .collect())
    }

    /// Hard class labels (threshold 0.5). Regression models return raw values.
    pub fn predict_label(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        let predictions = self.predict(x)?;
        Ok(match self.mode() {
            ModelMode::Regression => predictions,
            ModelMode::Classification => predictions
                .into_iter()
                .map(|p| if p >= 0.5 { 1.0 } else { 0.0 })
                .collect(),
        })
    }
}
