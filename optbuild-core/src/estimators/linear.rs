//! Linear models: ridge, lasso and L2-regularised logistic regression.

use crate::error::{OptbuildError, Result};
use serde::{Deserialize, Serialize};

const LASSO_MAX_ITER: usize = 1000;
const LASSO_TOL: f64 = 1e-6;
const LOGISTIC_MAX_ITER: usize = 1000;
const LOGISTIC_LEARNING_RATE: f64 = 0.5;
const LOGISTIC_TOL: f64 = 1e-6;

/// Coefficients and intercept of a linear decision function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn decision(&self, row: &[f64]) -> f64 {
        dot(&self.coef, row) + self.intercept
    }

    /// Undo centering: `intercept = y_mean - x_mean . coef`.
    fn from_centered(coef: Vec<f64>, x_mean: &[f64], y_offset: f64) -> Self {
        let intercept = y_offset - dot(x_mean, &coef);
        Self { coef, intercept }
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn column_means(x: &[Vec<f64>]) -> Vec<f64> {
    let n = x.len() as f64;
    let mut means = vec![0.0; x[0].len()];
    for row in x {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    means.iter_mut().for_each(|m| *m /= n);
    means
}

fn centered(x: &[Vec<f64>], means: &[f64]) -> Vec<Vec<f64>> {
    x.iter()
        .map(|row| row.iter().zip(means).map(|(v, m)| v - m).collect())
        .collect()
}

/// Ridge regression, `min ||y - Xw - b||^2 + alpha ||w||^2`.
///
/// Solves the primal (p x p) or dual (n x n) normal equations, whichever is smaller.
pub fn fit_ridge(x: &[Vec<f64>], y: &[f64], alpha: f64) -> Result<LinearModel> {
    let n = x.len();
    let p = x[0].len();
    let x_mean = column_means(x);
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let xc = centered(x, &x_mean);
    let yc: Vec<f64> = y.iter().map(|v| v - y_mean).collect();

    let coef = if p <= n {
        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for (row, target) in xc.iter().zip(&yc) {
            for i in 0..p {
                rhs[i] += row[i] * target;
                for j in i..p {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
            gram[i][i] += alpha;
        }
        solve(gram, rhs)?
    } else {
        let mut kernel = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let k = dot(&xc[i], &xc[j]);
                kernel[i][j] = k;
                kernel[j][i] = k;
            }
            kernel[i][i] += alpha;
        }
        let dual = solve(kernel, yc)?;
        let mut coef = vec![0.0; p];
        for (row, a) in xc.iter().zip(&dual) {
            for (c, v) in coef.iter_mut().zip(row) {
                *c += a * v;
            }
        }
        coef
    };

    Ok(LinearModel::from_centered(coef, &x_mean, y_mean))
}

/// Lasso by cyclic coordinate descent on `1/(2n) ||y - Xw - b||^2 + alpha ||w||_1`.
pub fn fit_lasso(x: &[Vec<f64>], y: &[f64], alpha: f64) -> LinearModel {
    let n = x.len();
    let p = x[0].len();
    let x_mean = column_means(x);
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let xc = centered(x, &x_mean);

    let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
    let col_sq: Vec<f64> = (0..p)
        .map(|j| xc.iter().map(|row| row[j] * row[j]).sum())
        .collect();
    let threshold = alpha * n as f64;
    let mut coef = vec![0.0; p];

    for iter in 0..LASSO_MAX_ITER {
        let mut max_delta: f64 = 0.0;
        for j in 0..p {
            if col_sq[j] == 0.0 {
                continue;
            }
            let rho: f64 = xc
                .iter()
                .zip(&residual)
                .map(|(row, r)| row[j] * r)
                .sum::<f64>()
                + col_sq[j] * coef[j];
            let updated = soft_threshold(rho, threshold) / col_sq[j];
            let delta = updated - coef[j];
            if delta != 0.0 {
                for (row, r) in xc.iter().zip(residual.iter_mut()) {
                    *r -= row[j] * delta;
                }
                coef[j] = updated;
                max_delta = max_delta.max(delta.abs());
            }
        }
        if max_delta < LASSO_TOL {
            tracing::trace!(iterations = iter + 1, "Lasso converged");
            break;
        }
    }

    LinearModel::from_centered(coef, &x_mean, y_mean)
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Binary logistic regression with L2 penalty `||w||^2 / (2c)`, fitted by
/// batch gradient descent on centered features.
pub fn fit_logistic(x: &[Vec<f64>], y: &[f64], c: f64) -> LinearModel {
    let n = x.len() as f64;
    let p = x[0].len();
    let x_mean = column_means(x);
    let xc = centered(x, &x_mean);

    let mut coef = vec![0.0; p];
    let mut bias = 0.0;
    let mut grad = vec![0.0; p];

    for _ in 0..LOGISTIC_MAX_ITER {
        grad.iter_mut().for_each(|g| *g = 0.0);
        let mut grad_bias = 0.0;
        for (row, target) in xc.iter().zip(y) {
            let err = sigmoid(dot(&coef, row) + bias) - target;
            for (g, v) in grad.iter_mut().zip(row) {
                *g += err * v;
            }
            grad_bias += err;
        }

        let mut norm = (grad_bias / n).powi(2);
        for (g, w) in grad.iter_mut().zip(&coef) {
            *g = *g / n + w / (c * n);
            norm += *g * *g;
        }
        for (w, g) in coef.iter_mut().zip(&grad) {
            *w -= LOGISTIC_LEARNING_RATE * g;
        }
        bias -= LOGISTIC_LEARNING_RATE * grad_bias / n;

        if norm.sqrt() < LOGISTIC_TOL {
            break;
        }
    }

    LinearModel::from_centered(coef, &x_mean, bias)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(OptbuildError::training(
                "singular system; increase the regularisation strength",
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[row][row];
    }
    Ok(solution)
}
