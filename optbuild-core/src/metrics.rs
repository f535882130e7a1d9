//! Scoring functions and k-fold cross-validation.
//!
//! Every scorer follows the "higher is better" convention, so regression
//! errors are reported negated.

use crate::config::ModelMode;
use crate::error::{OptbuildError, Result};
use crate::estimators::Algorithm;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model quality measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    R2,
    NegMeanSquaredError,
    NegMeanAbsoluteError,
    Accuracy,
    RocAuc,
    F1,
}

impl Scoring {
    pub const REGRESSION: [Scoring; 3] = [
        Scoring::R2,
        Scoring::NegMeanSquaredError,
        Scoring::NegMeanAbsoluteError,
    ];
    pub const CLASSIFICATION: [Scoring; 3] = [Scoring::Accuracy, Scoring::RocAuc, Scoring::F1];

    pub fn default_for(mode: ModelMode) -> Self {
        match mode {
            ModelMode::Regression => Self::NegMeanSquaredError,
            ModelMode::Classification => Self::RocAuc,
        }
    }

    pub fn all_for(mode: ModelMode) -> &'static [Scoring] {
        match mode {
            ModelMode::Regression => &Self::REGRESSION,
            ModelMode::Classification => &Self::CLASSIFICATION,
        }
    }

    pub fn mode(&self) -> ModelMode {
        match self {
            Self::R2 | Self::NegMeanSquaredError | Self::NegMeanAbsoluteError => {
                ModelMode::Regression
            }
            Self::Accuracy | Self::RocAuc | Self::F1 => ModelMode::Classification,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::R2 => "r2",
            Self::NegMeanSquaredError => "neg_mean_squared_error",
            Self::NegMeanAbsoluteError => "neg_mean_absolute_error",
            Self::Accuracy => "accuracy",
            Self::RocAuc => "roc_auc",
            Self::F1 => "f1",
        }
    }

    /// Score predictions. Classification scorers expect class-1 probabilities.
    pub fn score(&self, y_true: &[f64], y_pred: &[f64]) -> f64 {
        match self {
            Self::R2 => r2(y_true, y_pred),
            Self::NegMeanSquaredError => -mean_squared_error(y_true, y_pred),
            Self::NegMeanAbsoluteError => -mean_absolute_error(y_true, y_pred),
            Self::Accuracy => accuracy(y_true, y_pred),
            Self::RocAuc => roc_auc(y_true, y_pred),
            Self::F1 => f1(y_true, y_pred),
        }
    }
}

impl std::fmt::Display for Scoring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// All scorers of `mode`, keyed by name.
pub fn score_all(mode: ModelMode, y_true: &[f64], y_pred: &[f64]) -> BTreeMap<String, f64> {
    Scoring::all_for(mode)
        .iter()
        .map(|s| (s.name().to_string(), s.score(y_true, y_pred)))
        .collect()
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / n
}

/// Coefficient of determination. A constant target scores 1.0 when
/// predicted exactly and 0.0 otherwise.
pub fn r2(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn label(p: f64) -> f64 {
    if p >= 0.5 { 1.0 } else { 0.0 }
}

pub fn accuracy(y_true: &[f64], y_prob: &[f64]) -> f64 {
    let hits = y_true
        .iter()
        .zip(y_prob)
        .filter(|(t, p)| **t == label(**p))
        .count();
    hits as f64 / y_true.len() as f64
}

/// F1 of the positive class; 0.0 when there are no true positives.
pub fn f1(y_true: &[f64], y_prob: &[f64]) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0.0, 0.0, 0.0);
    for (t, p) in y_true.iter().zip(y_prob) {
        match (*t == 1.0, label(*p) == 1.0) {
            (true, true) => tp += 1.0,
            (false, true) => fp += 1.0,
            (true, false) => fn_ += 1.0,
            (false, false) => {}
        }
    }
    if tp == 0.0 {
        return 0.0;
    }
    2.0 * tp / (2.0 * tp + fp + fn_)
}

/// Area under the ROC curve via the Mann-Whitney rank statistic, averaging
/// ranks over ties. Returns 0.5 when only one class is present.
pub fn roc_auc(y_true: &[f64], y_prob: &[f64]) -> f64 {
    let n_pos = y_true.iter().filter(|&&t| t == 1.0).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..y_prob.len()).collect();
    order.sort_by(|&a, &b| y_prob[a].total_cmp(&y_prob[b]));

    let mut ranks = vec![0.0; order.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && y_prob[order[end + 1]] == y_prob[order[start]] {
            end += 1;
        }
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = avg_rank;
        }
        start = end + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(t, _)| **t == 1.0)
        .map(|(_, r)| r)
        .sum();
    let n_pos = n_pos as f64;
    (pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64)
}

/// Cross-validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidation {
    pub n_folds: usize,
    pub shuffle: bool,
    pub random_state: u64,
}

/// Cross-validation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub metric_name: String,
}

impl CrossValidationResult {
    pub fn from_scores(scores: Vec<f64>, metric_name: &str) -> Self {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        Self {
            fold_scores: scores,
            mean_score: mean,
            std_score: variance.sqrt(),
            metric_name: metric_name.to_string(),
        }
    }
}

impl CrossValidation {
    /// Validation-fold indices; the first `n % k` folds get one extra row.
    pub fn folds(&self, n: usize) -> Result<Vec<Vec<usize>>> {
        if self.n_folds < 2 {
            return Err(OptbuildError::validation(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.n_folds
            )));
        }
        if n < self.n_folds {
            return Err(OptbuildError::dataset(format!(
                "{} rows are too few for {}-fold cross-validation",
                n, self.n_folds
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        if self.shuffle {
            indices.shuffle(&mut StdRng::seed_from_u64(self.random_state));
        }

        let base = n / self.n_folds;
        let extra = n % self.n_folds;
        let mut folds = Vec::with_capacity(self.n_folds);
        let mut start = 0;
        for fold in 0..self.n_folds {
            let size = base + usize::from(fold < extra);
            folds.push(indices[start..start + size].to_vec());
            start += size;
        }
        Ok(folds)
    }

    /// Fit on k-1 folds, score on the held-out fold, for every fold.
    pub fn evaluate(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        algorithm: &Algorithm,
        scoring: Scoring,
    ) -> Result<CrossValidationResult> {
        let folds = self.folds(x.len())?;
        let mut in_fold = vec![usize::MAX; x.len()];
        for (fold, members) in folds.iter().enumerate() {
            for &idx in members {
                in_fold[idx] = fold;
            }
        }

        let mut scores = Vec::with_capacity(folds.len());
        for (fold, members) in folds.iter().enumerate() {
            let (train_x, train_y): (Vec<Vec<f64>>, Vec<f64>) = (0..x.len())
                .filter(|&i| in_fold[i] != fold)
                .map(|i| (x[i].clone(), y[i]))
                .unzip();
            let valid_x: Vec<Vec<f64>> = members.iter().map(|&i| x[i].clone()).collect();
            let valid_y: Vec<f64> = members.iter().map(|&i| y[i]).collect();

            let model = algorithm.fit(&train_x, &train_y)?;
            let score = scoring.score(&valid_y, &model.predict(&valid_x)?);
            tracing::trace!(fold, score, "Cross-validation fold scored");
            scores.push(score);
        }
        Ok(CrossValidationResult::from_scores(scores, scoring.name()))
    }
}
