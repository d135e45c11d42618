//! Correlation-based feature pruning
//!
//! When two features correlate above the threshold, the member with the
//! higher mean absolute correlation to the remaining features is
//! dropped; on an exact tie the later column in schema order goes. This
//! makes the pruning decision deterministic for a given training frame.

use crate::error::{DemandError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Prunes one feature out of each highly correlated pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationPruner {
    threshold: f64,
    dropped: Vec<String>,
    kept: Vec<String>,
    is_fitted: bool,
}

impl CorrelationPruner {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            dropped: Vec::new(),
            kept: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Columns dropped at fit time
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Columns kept at fit time
    pub fn kept(&self) -> &[String] {
        &self.kept
    }

    /// Decide which of the given columns to prune
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DemandError::InvalidParameter {
                name: "correlation_threshold".to_string(),
                value: format!("{}", self.threshold),
                reason: "must be in [0, 1]".to_string(),
            });
        }

        self.dropped.clear();
        self.kept.clear();

        let n = columns.len();
        let mut data: Vec<Vec<f64>> = Vec::with_capacity(n);
        for &name in columns {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.to_string()))?;
            let casted = col.cast(&DataType::Float64)?;
            let values: Vec<f64> = casted
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            data.push(values);
        }

        // Absolute correlation matrix, upper triangle
        let mut corr = vec![vec![0.0f64; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let c = pearson_correlation(&data[i], &data[j]).abs();
                corr[i][j] = c;
                corr[j][i] = c;
            }
        }

        let mut removed = vec![false; n];
        for i in 0..n {
            for j in (i + 1)..n {
                if removed[i] || removed[j] {
                    continue;
                }
                if corr[i][j] > self.threshold {
                    let mean_i = mean_correlation(&corr, i, &removed);
                    let mean_j = mean_correlation(&corr, j, &removed);
                    let remove_idx = if mean_i > mean_j { i } else { j };
                    removed[remove_idx] = true;

                    tracing::debug!(
                        kept = columns[i + j - remove_idx],
                        dropped = columns[remove_idx],
                        correlation = corr[i][j],
                        "pruned correlated feature"
                    );
                }
            }
        }

        for (idx, &name) in columns.iter().enumerate() {
            if removed[idx] {
                self.dropped.push(name.to_string());
            } else {
                self.kept.push(name.to_string());
            }
        }

        if !self.dropped.is_empty() {
            tracing::info!(
                dropped = self.dropped.len(),
                kept = self.kept.len(),
                "correlation pruning complete"
            );
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Drop the pruned columns from a frame
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }

        let mut df = df.clone();
        for name in &self.dropped {
            if df.get_column_names().iter().any(|c| c.as_str() == name) {
                df = df.drop(name)?;
            }
        }
        Ok(df)
    }

    /// Fit on a frame and prune it in one call
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

/// Pearson correlation; zero-variance columns yield 0
fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }

    let mean_a = a.iter().take(n).sum::<f64>() / n as f64;
    let mean_b = b.iter().take(n).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a < 1e-12 || var_b < 1e-12 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Mean absolute correlation of feature `idx` to all other surviving
/// features
fn mean_correlation(corr: &[Vec<f64>], idx: usize, removed: &[bool]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for j in 0..corr.len() {
        if j != idx && !removed[j] {
            sum += corr[idx][j];
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correlated_df() -> DataFrame {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let x2: Vec<f64> = x.iter().map(|v| v * 2.0 + 1.0).collect();
        let noise: Vec<f64> = (0..50).map(|i| ((i * 7919) % 83) as f64).collect();
        df!("a" => x, "b" => x2, "c" => noise).unwrap()
    }

    #[test]
    fn test_prunes_one_of_perfectly_correlated_pair() {
        let df = correlated_df();
        let mut pruner = CorrelationPruner::new(0.9);
        let out = pruner.fit_transform(&df, &["a", "b", "c"]).unwrap();

        assert_eq!(pruner.dropped().len(), 1);
        assert_eq!(out.width(), 2);
        assert!(out.get_column_names().iter().any(|c| c.as_str() == "c"));
    }

    #[test]
    fn test_tie_breaks_toward_later_column() {
        // Two identical columns with no third feature: mean correlations
        // are equal, so the later column must go
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let df = df!("first" => x.clone(), "second" => x).unwrap();

        let mut pruner = CorrelationPruner::new(0.9);
        pruner.fit(&df, &["first", "second"]).unwrap();

        assert_eq!(pruner.dropped(), &["second".to_string()]);
        assert_eq!(pruner.kept(), &["first".to_string()]);
    }

    #[test]
    fn test_deterministic_across_fits() {
        let df = correlated_df();

        let mut first = CorrelationPruner::new(0.9);
        first.fit(&df, &["a", "b", "c"]).unwrap();
        let mut second = CorrelationPruner::new(0.9);
        second.fit(&df, &["a", "b", "c"]).unwrap();

        assert_eq!(first.dropped(), second.dropped());
    }

    #[test]
    fn test_uncorrelated_features_survive() {
        let df = correlated_df();
        let mut pruner = CorrelationPruner::new(0.999999);
        let out = pruner.fit_transform(&df, &["a", "c"]).unwrap();

        assert!(pruner.dropped().is_empty());
        assert_eq!(out.width(), 3);
    }

    #[test]
    fn test_zero_variance_column_is_not_correlated() {
        let df = df!(
            "flat" => vec![5.0f64; 20],
            "x" => (0..20).map(|i| i as f64).collect::<Vec<_>>(),
        )
        .unwrap();

        let mut pruner = CorrelationPruner::new(0.9);
        pruner.fit(&df, &["flat", "x"]).unwrap();
        assert!(pruner.dropped().is_empty());
    }

    #[test]
    fn test_invalid_threshold() {
        let df = correlated_df();
        let mut pruner = CorrelationPruner::new(1.5);
        assert!(pruner.fit(&df, &["a", "b"]).is_err());
    }
}
