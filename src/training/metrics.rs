//! Regression metrics

use crate::error::{DemandError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metrics for a fitted model; fields stay `None` until computed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mse: Option<f64>,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub r2: Option<f64>,
    pub training_time_secs: Option<f64>,
    pub n_samples: Option<usize>,
    pub n_features: Option<usize>,
}

impl ModelMetrics {
    /// MSE, RMSE, MAE and R² against a prediction vector
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(DemandError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{}", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(DemandError::ValidationError(
                "cannot compute metrics on empty vectors".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let mse = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum::<f64>()
            / n;
        let mae = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).abs())
            .sum::<f64>()
            / n;

        let y_mean = y_true.mean().unwrap_or(0.0);
        let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean).powi(2)).sum();
        let ss_res = mse * n;
        // Constant targets leave R² undefined; report zero
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        };

        Ok(Self {
            mse: Some(mse),
            rmse: Some(mse.sqrt()),
            mae: Some(mae),
            r2: Some(r2),
            training_time_secs: None,
            n_samples: Some(y_true.len()),
            n_features: None,
        })
    }

    pub fn with_training_time(mut self, secs: f64) -> Self {
        self.training_time_secs = Some(secs);
        self
    }

    pub fn with_n_features(mut self, n: usize) -> Self {
        self.n_features = Some(n);
        self
    }
}

impl std::fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn opt(v: Option<f64>) -> String {
            v.map_or_else(|| "-".to_string(), |x| format!("{:.4}", x))
        }
        write!(
            f,
            "MSE {} | RMSE {} | MAE {} | R2 {}",
            opt(self.mse),
            opt(self.rmse),
            opt(self.mae),
            opt(self.r2)
        )
    }
}
