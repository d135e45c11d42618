//! Linear regression via the normal equations
//!
//! Solves (X^T X + alpha*I) w = X^T y with a Cholesky factorization,
//! falling back to Gauss-Jordan inversion when the system is not
//! positive definite even after a small ridge retry.

use crate::error::{DemandError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Linear regression, optionally ridge-regularized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    fit_intercept: bool,
    /// L2 regularization strength
    alpha: f64,
    is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            fit_intercept: true,
            alpha: 0.0,
            is_fitted: false,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Ridge strength; zero gives ordinary least squares
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples == 0 || n_features == 0 {
            return Err(DemandError::TrainingError(
                "cannot fit on empty data".to_string(),
            ));
        }
        if n_samples != y.len() {
            return Err(DemandError::ShapeError {
                expected: format!("{} target values", n_samples),
                actual: format!("{}", y.len()),
            });
        }
        if self.alpha < 0.0 {
            return Err(DemandError::InvalidParameter {
                name: "alpha".to_string(),
                value: format!("{}", self.alpha),
                reason: "must be non-negative".to_string(),
            });
        }

        // Center when fitting an intercept so the bias drops out of the solve
        let (x_c, y_c, means) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| DemandError::ComputationError("empty design matrix".to_string()))?;
            let y_mean = y.mean().unwrap_or(0.0);
            let x_c = x - &x_mean.clone().insert_axis(Axis(0));
            let y_c = y - y_mean;
            (x_c, y_c, Some((x_mean, y_mean)))
        } else {
            (x.clone(), y.clone(), None)
        };

        let mut xtx = x_c.t().dot(&x_c);
        if self.alpha > 0.0 {
            for i in 0..n_features {
                xtx[[i, i]] += self.alpha;
            }
        }
        let xty = x_c.t().dot(&y_c);

        let coefficients = solve_spd(&xtx, &xty).ok_or_else(|| {
            DemandError::ComputationError("design matrix is singular".to_string())
        })?;

        self.intercept = match means {
            Some((x_mean, y_mean)) => y_mean - coefficients.dot(&x_mean),
            None => 0.0,
        };
        self.coefficients = Some(coefficients);
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coef = self
            .coefficients
            .as_ref()
            .ok_or(DemandError::ModelNotFitted)?;
        if x.ncols() != coef.len() {
            return Err(DemandError::ShapeError {
                expected: format!("{} features", coef.len()),
                actual: format!("{}", x.ncols()),
            });
        }
        Ok(x.dot(coef) + self.intercept)
    }

    /// Normalized absolute coefficients, a rough importance proxy
    pub fn coefficient_magnitudes(&self) -> Option<Array1<f64>> {
        let coef = self.coefficients.as_ref()?;
        let mut mags = coef.mapv(f64::abs);
        let total = mags.sum();
        if total > 0.0 {
            mags.mapv_inplace(|v| v / total);
        }
        Some(mags)
    }
}

/// Solve a symmetric positive-definite system, Cholesky first with a
/// Gauss-Jordan inverse as the last resort
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if let Some(x) = cholesky_solve(a, b) {
        return Some(x);
    }
    matrix_inverse(a).map(|inv| inv.dot(b))
}

fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let l = match cholesky_factor(a) {
        Some(l) => l,
        None => {
            // Not positive definite; retry once with a small ridge
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
            let mut a_reg = a.clone();
            for k in 0..n {
                a_reg[[k, k]] += ridge;
            }
            cholesky_factor(&a_reg)?
        }
    };

    // Forward substitution: L * z = b
    let mut z = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = z
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Lower-triangular factor L with A = L * L^T, or None if A is not PD
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l: Array2<f64> = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Gauss-Jordan inverse with partial pivoting
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            for j in 0..2 * n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[max_row, j]];
                aug[[max_row, j]] = tmp;
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }
    Some(inv)
}
