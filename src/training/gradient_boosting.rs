//! Gradient boosting regressor
//!
//! Squared-error boosting: each stage fits a shallow CART tree to the
//! current residuals and the ensemble advances by a learning-rate
//! fraction of that tree's prediction.

use crate::error::{DemandError, Result};
use crate::training::decision_tree::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Gradient boosting regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    /// Fraction of rows each stage trains on
    subsample: f64,
    random_state: Option<u64>,
    init_value: f64,
    trees: Vec<DecisionTree>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_fitted: bool,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new_regressor()
    }
}

impl GradientBoosting {
    pub fn new_regressor() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: None,
            init_value: 0.0,
            trees: Vec::new(),
            n_features: 0,
            feature_importances: None,
            is_fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n.max(1);
        self
    }

    pub fn with_subsample(mut self, fraction: f64) -> Self {
        self.subsample = fraction;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(DemandError::TrainingError(
                "cannot fit on empty data".to_string(),
            ));
        }
        if n != y.len() {
            return Err(DemandError::ShapeError {
                expected: format!("{} target values", n),
                actual: format!("{}", y.len()),
            });
        }
        if self.learning_rate <= 0.0 {
            return Err(DemandError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: format!("{}", self.learning_rate),
                reason: "must be positive".to_string(),
            });
        }
        if self.subsample <= 0.0 || self.subsample > 1.0 {
            return Err(DemandError::InvalidParameter {
                name: "subsample".to_string(),
                value: format!("{}", self.subsample),
                reason: "must be in (0, 1]".to_string(),
            });
        }

        self.n_features = x.ncols();
        self.init_value = y.mean().unwrap_or(0.0);

        let mut rng = match self.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut preds = Array1::from_elem(n, self.init_value);
        let mut trees: Vec<DecisionTree> = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let residuals: Array1<f64> = y - &preds;
            if residuals.mapv(|r| r * r).sum() < 1e-12 {
                break;
            }

            let rows = subsample_rows(&mut rng, n, self.subsample);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.max_depth)
                .with_min_samples_split(self.min_samples_split)
                .with_min_samples_leaf(self.min_samples_leaf);

            if rows.len() < n {
                let xs = x.select(Axis(0), &rows);
                let rs = residuals.select(Axis(0), &rows);
                tree.fit(&xs, &rs)?;
            } else {
                tree.fit(x, &residuals)?;
            }

            let stage = tree.predict(x)?;
            preds.scaled_add(self.learning_rate, &stage);
            trees.push(tree);
        }

        let mut importances = Array1::zeros(self.n_features);
        for tree in &trees {
            if let Some(imp) = tree.feature_importances() {
                importances += imp;
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances.mapv_inplace(|v| v / total);
        }

        self.trees = trees;
        self.feature_importances = Some(importances);
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|t| t.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut out = Array1::from_elem(x.nrows(), self.init_value);
        for preds in &per_tree {
            out.scaled_add(self.learning_rate, preds);
        }
        Ok(out)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

/// Row subsample: shuffle, truncate, sort
fn subsample_rows(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil().max(1.0) as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| {
            if j == 0 {
                i as f64 * 0.1
            } else {
                (i % 4) as f64
            }
        });
        let y = Array1::from_shape_fn(50, |i| 3.0 * (i as f64 * 0.1) + 2.0);
        (x, y)
    }

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(30, |i| if i < 15 { 1.0 } else { 10.0 });
        (x, y)
    }

    #[test]
    fn test_converges_on_step() {
        let (x, y) = step_data();
        let mut gbm = GradientBoosting::new_regressor()
            .with_n_estimators(100)
            .with_learning_rate(0.1);
        gbm.fit(&x, &y).unwrap();

        let preds = gbm.predict(&x).unwrap();
        for i in 0..30 {
            assert!((preds[i] - y[i]).abs() < 1e-2, "row {}: {}", i, preds[i]);
        }
    }

    #[test]
    fn test_fits_linear_trend() {
        let (x, y) = linear_data();
        let mut gbm = GradientBoosting::new_regressor().with_n_estimators(100);
        gbm.fit(&x, &y).unwrap();

        let preds = gbm.predict(&x).unwrap();
        let ym = y.mean().unwrap();
        let ss_res: f64 = (&preds - &y).mapv(|v| v * v).sum();
        let ss_tot: f64 = y.mapv(|v| (v - ym).powi(2)).sum();
        let r2 = 1.0 - ss_res / ss_tot;
        assert!(r2 > 0.95, "r2 = {}", r2);
    }

    #[test]
    fn test_subsample_reproducible() {
        let (x, y) = linear_data();

        let mut a = GradientBoosting::new_regressor()
            .with_n_estimators(20)
            .with_subsample(0.7)
            .with_random_state(11);
        let mut b = GradientBoosting::new_regressor()
            .with_n_estimators(20)
            .with_subsample(0.7)
            .with_random_state(11);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let pa = a.predict(&x).unwrap();
        let pb = b.predict(&x).unwrap();
        for i in 0..pa.len() {
            assert_eq!(pa[i], pb[i]);
        }
    }

    #[test]
    fn test_invalid_learning_rate() {
        let (x, y) = linear_data();
        let mut gbm = GradientBoosting::new_regressor().with_learning_rate(0.0);
        assert!(matches!(
            gbm.fit(&x, &y),
            Err(DemandError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_invalid_subsample() {
        let (x, y) = linear_data();
        let mut gbm = GradientBoosting::new_regressor().with_subsample(1.5);
        assert!(matches!(
            gbm.fit(&x, &y),
            Err(DemandError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_unfitted_errors() {
        let (x, _) = linear_data();
        let gbm = GradientBoosting::new_regressor();
        assert!(matches!(gbm.predict(&x), Err(DemandError::ModelNotFitted)));
    }

    #[test]
    fn test_constant_target_stops_early() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i * 2 + j) as f64);
        let y = Array1::from_elem(20, 5.0);

        let mut gbm = GradientBoosting::new_regressor().with_n_estimators(50);
        gbm.fit(&x, &y).unwrap();

        assert_eq!(gbm.n_stages(), 0);
        let preds = gbm.predict(&x).unwrap();
        assert!(preds.iter().all(|&p| (p - 5.0).abs() < 1e-12));
    }
}
