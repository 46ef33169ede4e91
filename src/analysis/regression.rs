//! Ordinary least squares and the evaluation helpers around it.
//!
//! Small dense problems only: the normal equations are solved directly with
//! Gaussian elimination on centred data.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{Error, Result};

/// A pivot this small relative to its column's own sum of squares marks the
/// column as a linear combination of earlier ones (points vs wins/draws).
const DEPENDENT_TOL: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegression {
    /// Fit `y = intercept + x . coefficients`.
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<Self> {
        let n = x.len();
        if n == 0 {
            return Err(Error::Validation("cannot fit on zero samples".to_string()));
        }
        if y.len() != n {
            return Err(Error::Validation(format!("{n} feature rows but {} targets", y.len())));
        }
        let p = x[0].len();
        if let Some(i) = x.iter().position(|row| row.len() != p) {
            return Err(Error::Validation(format!(
                "sample {i} has {} features, expected {p}",
                x[i].len()
            )));
        }

        let x_mean: Vec<f64> = (0..p)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n as f64;

        // X'X and X'y over centred columns
        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        for (row, target) in x.iter().zip(y) {
            let dy = target - y_mean;
            for a in 0..p {
                let da = row[a] - x_mean[a];
                xty[a] += da * dy;
                for b in a..p {
                    xtx[a][b] += da * (row[b] - x_mean[b]);
                }
            }
        }
        for a in 0..p {
            for b in 0..a {
                xtx[a][b] = xtx[b][a];
            }
        }

        let coefficients = solve(xtx, xty);
        let intercept = y_mean - dot(&coefficients, &x_mean);

        Ok(Self {
            intercept,
            coefficients,
        })
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        self.intercept + dot(&self.coefficients, row)
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }
}

/// Solve the normal equations `a * x = b` for symmetric positive
/// semi-definite `a` by elimination in column order.
///
/// Dependent columns get a zero coefficient, so collinear features still
/// give a least-squares fit.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    let diag: Vec<f64> = (0..n).map(|i| a[i][i]).collect();
    let floor = f64::EPSILON * diag.iter().copied().fold(0.0, f64::max);
    let mut dependent = vec![false; n];

    for col in 0..n {
        if diag[col] <= floor || a[col][col] <= DEPENDENT_TOL * diag[col] {
            debug!(column = col, "Dropping linearly dependent feature");
            dependent[col] = true;
            continue;
        }
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

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        if dependent[row] {
            continue;
        }
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return Err(Error::Validation(format!(
            "cannot score {} predictions against {} targets",
            predicted.len(),
            actual.len()
        )));
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Shuffled `(train, test)` index sets. The test set holds
/// `ceil(n * test_fraction)` samples; the same seed gives the same split.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(Error::Validation(format!(
            "test fraction must be in [0, 1), got {test_fraction}"
        )));
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::Validation(format!(
            "{n} samples cannot be split with test fraction {test_fraction}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices[..n_test].to_vec();
    let train = indices[n_test..].to_vec();
    Ok((train, test))
}

/// RMSE of each of `folds` contiguous, unshuffled folds. The first
/// `n % folds` folds take one extra sample.
pub fn cross_val_rmse(x: &[Vec<f64>], y: &[f64], folds: usize) -> Result<Vec<f64>> {
    let n = x.len();
    if folds < 2 || folds > n {
        return Err(Error::Validation(format!(
            "cannot run {folds}-fold cross validation on {n} samples"
        )));
    }

    let mut scores = Vec::with_capacity(folds);
    let mut start = 0;
    for fold in 0..folds {
        let size = n / folds + usize::from(fold < n % folds);
        let end = start + size;

        let (train_x, train_y): (Vec<Vec<f64>>, Vec<f64>) = (0..n)
            .filter(|i| !(start..end).contains(i))
            .map(|i| (x[i].clone(), y[i]))
            .unzip();
        let model = LinearRegression::fit(&train_x, &train_y)?;
        let predicted = model.predict(&x[start..end]);
        scores.push(mean_squared_error(&y[start..end], &predicted)?.sqrt());

        start = end;
    }
    Ok(scores)
}

/// Rows of `x` and `y` picked by `indices`.
pub fn select(x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
    indices.iter().map(|&i| (x[i].clone(), y[i])).unzip()
}
