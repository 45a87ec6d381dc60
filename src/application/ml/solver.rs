//! Newton / IRLS solver for L2-penalised, sample-weighted logistic regression.
//!
//! Minimises `sum_i c_i * logloss(y_i, sigmoid(b + w.x_i)) + (l2 / 2) * |w|^2`.
//! The intercept `b` is never penalised.

use crate::domain::errors::TrainingError;
use crate::domain::ml::model::sigmoid;
use ndarray::{Array1, Array2, Axis};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub l2_penalty: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            l2_penalty: 1.0,
            max_iter: 100,
            tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
    pub objective: f64,
}

const MAX_HALVINGS: usize = 30;

/// `log(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

struct Problem {
    design: Array2<f64>,
    targets: Array1<f64>,
    weights: Array1<f64>,
    l2: f64,
}

impl Problem {
    fn objective(&self, theta: &Array1<f64>) -> f64 {
        let z = self.design.dot(theta);
        let loss: f64 = z
            .iter()
            .zip(self.targets.iter())
            .zip(self.weights.iter())
            .map(|((&z, &y), &c)| c * (softplus(z) - y * z))
            .sum();
        let penalty: f64 = theta.iter().skip(1).map(|t| t * t).sum();
        loss + 0.5 * self.l2 * penalty
    }

    /// Gradient and Hessian of the objective at `theta`.
    fn derivatives(&self, theta: &Array1<f64>) -> (Array1<f64>, Array2<f64>) {
        let p = self.design.dot(theta).mapv(sigmoid);
        let residual = &self.weights * &(&p - &self.targets);
        let curvature = &self.weights * &p.mapv(|v| v * (1.0 - v));

        let mut gradient = self.design.t().dot(&residual);
        let scaled = &self.design * &curvature.view().insert_axis(Axis(1));
        let mut hessian = self.design.t().dot(&scaled);

        for j in 1..theta.len() {
            gradient[j] += self.l2 * theta[j];
            hessian[[j, j]] += self.l2;
        }
        (gradient, hessian)
    }
}

/// Solves `a * x = b` by Gaussian elimination with partial pivoting.
/// Returns `None` when `a` is numerically singular.
pub fn solve_linear(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[[i, col]]
                .abs()
                .partial_cmp(&a[[j, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if !a[[pivot, col]].is_finite() || a[[pivot, col]].abs() < 1e-14 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

/// Fits the model. `rows`, `labels` and `sample_weights` must have equal
/// length and every row must have the same width.
pub fn fit_logistic(
    rows: &[Vec<f64>],
    labels: &[u8],
    sample_weights: &[f64],
    settings: &SolverSettings,
) -> Result<SolverOutcome, TrainingError> {
    let n = rows.len();
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let dim = width + 1;

    let problem = Problem {
        design: Array2::from_shape_fn((n, dim), |(i, j)| if j == 0 { 1.0 } else { rows[i][j - 1] }),
        targets: labels.iter().map(|&l| f64::from(l)).collect(),
        weights: Array1::from(sample_weights.to_vec()),
        l2: settings.l2_penalty,
    };

    let mut theta = Array1::<f64>::zeros(dim);
    let mut objective = problem.objective(&theta);
    let mut converged = false;
    let mut iterations = 0;

    while iterations < settings.max_iter {
        iterations += 1;
        let (gradient, hessian) = problem.derivatives(&theta);
        let step = solve_linear(hessian, gradient).ok_or(TrainingError::Singular {
            iteration: iterations,
        })?;

        let mut scale = 1.0;
        let mut candidate = &theta - &step;
        let mut candidate_obj = problem.objective(&candidate);
        let mut halvings = 0;
        while !(candidate_obj.is_finite() && candidate_obj <= objective + 1e-12 * objective.abs())
            && halvings < MAX_HALVINGS
        {
            scale *= 0.5;
            candidate = &theta - &(&step * scale);
            candidate_obj = problem.objective(&candidate);
            halvings += 1;
        }
        if !candidate_obj.is_finite() {
            return Err(TrainingError::Diverged {
                iteration: iterations,
            });
        }

        let max_change = step.iter().fold(0.0f64, |m, s| m.max((s * scale).abs()));
        theta = candidate;
        objective = candidate_obj;

        if max_change < settings.tolerance {
            converged = true;
            break;
        }
    }

    Ok(SolverOutcome {
        coefficients: theta.iter().skip(1).copied().collect(),
        intercept: theta[0],
        iterations,
        converged,
        objective,
    })
}
