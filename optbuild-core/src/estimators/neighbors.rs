//! k-nearest-neighbours regression and classification.

use crate::config::ModelMode;
use serde::{Deserialize, Serialize};

/// How neighbours contribute to a prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weights {
    #[default]
    Uniform,
    /// Inverse Euclidean distance.
    Distance,
}

/// A k-NN model keeps its training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborsModel {
    pub n_neighbors: usize,
    pub weights: Weights,
    pub mode: ModelMode,
    pub train_x: Vec<Vec<f64>>,
    pub train_y: Vec<f64>,
}

impl NeighborsModel {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        n_neighbors: usize,
        weights: Weights,
        mode: ModelMode,
    ) -> Self {
        Self {
            n_neighbors,
            weights,
            mode,
            train_x: x.to_vec(),
            train_y: y.to_vec(),
        }
    }

    pub fn n_features(&self) -> usize {
        self.train_x.first().map(Vec::len).unwrap_or(0)
    }

    /// Weighted mean response of the nearest neighbours. For classifiers
    /// with 0/1 responses this is the probability of class 1.
    pub fn predict_one(&self, row: &[f64]) -> f64 {
        let mut distances: Vec<(f64, f64)> = self
            .train_x
            .iter()
            .zip(&self.train_y)
            .map(|(train, &y)| (euclidean(train, row), y))
            .collect();
        let k = self.n_neighbors.min(distances.len());
        if k == 0 {
            return f64::NAN;
        }
        if k < distances.len() {
            distances.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));
            distances.truncate(k);
        }

        match self.weights {
            Weights::Uniform => mean(distances.iter().map(|(_, y)| *y)),
            Weights::Distance => {
                // Exact matches dominate, as with inverse-distance weighting at d = 0.
                if distances.iter().any(|(d, _)| *d == 0.0) {
                    return mean(distances.iter().filter(|(d, _)| *d == 0.0).map(|(_, y)| *y));
                }
                let (weighted, total) = distances
                    .iter()
                    .fold((0.0, 0.0), |(acc, tot), (d, y)| (acc + y / d, tot + 1.0 / d));
                weighted / total
            }
        }
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    sum / count as f64
}
