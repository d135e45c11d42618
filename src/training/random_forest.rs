//! Random forest regressor
//!
//! Bagged CART trees with per-split feature subsampling. Trees are
//! fitted in parallel; each tree gets a seed derived from the forest
//! seed so runs reproduce exactly.

use crate::error::{DemandError, Result};
use crate::training::decision_tree::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Count(usize),
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().round() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => *k,
        };
        k.clamp(1, n_features)
    }
}

/// Random forest regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: MaxFeatures,
    bootstrap: bool,
    random_state: Option<u64>,
    trees: Vec<DecisionTree>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_fitted: bool,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_regressor()
    }
}

impl RandomForest {
    pub fn new_regressor() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: None,
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

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
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

    pub fn with_max_features(mut self, mf: MaxFeatures) -> Self {
        self.max_features = mf;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fit all trees on bootstrap resamples
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

        self.n_features = x.ncols();
        let k = self.max_features.resolve(self.n_features);
        let base_seed = self.random_state.unwrap_or_else(rand::random);

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(i as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let mut tree = DecisionTree::new_regressor()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree.max_features = Some(k);
                tree.random_state = Some(seed);

                if self.bootstrap {
                    let idx: Vec<usize> =
                        (0..n).map(|_| (rng.next_u64() % n as u64) as usize).collect();
                    let xs = x.select(Axis(0), &idx);
                    let ys = y.select(Axis(0), &idx);
                    tree.fit(&xs, &ys)?;
                } else {
                    tree.fit(x, y)?;
                }
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut importances = Array1::zeros(self.n_features);
        for tree in &trees {
            if let Some(imp) = tree.feature_importances() {
                importances += imp;
            }
        }
        importances /= trees.len() as f64;

        self.trees = trees;
        self.feature_importances = Some(importances);
        self.is_fitted = true;
        Ok(self)
    }

    /// Average prediction across trees
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted || self.trees.is_empty() {
            return Err(DemandError::ModelNotFitted);
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|t| t.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut out = Array1::zeros(x.nrows());
        for preds in &per_tree {
            out += preds;
        }
        out /= self.trees.len() as f64;
        Ok(out)
    }

    /// Importances averaged over trees
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| match j {
            0 => i as f64,
            1 => (i % 5) as f64,
            _ => 1.0,
        });
        let y = Array1::from_shape_fn(40, |i| if i < 20 { 2.0 } else { 9.0 });
        (x, y)
    }

    #[test]
    fn test_fit_and_predict() {
        let (x, y) = step_data();
        let mut forest = RandomForest::new_regressor()
            .with_n_estimators(20)
            .with_max_depth(4)
            .with_random_state(42);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.n_trees(), 20);
        let preds = forest.predict(&x).unwrap();
        // Ends of the step should be clearly separated
        assert!(preds[0] < 5.0);
        assert!(preds[39] > 6.0);
    }

    #[test]
    fn test_reproducible_with_seed() {
        let (x, y) = step_data();

        let mut a = RandomForest::new_regressor()
            .with_n_estimators(10)
            .with_random_state(7);
        let mut b = RandomForest::new_regressor()
            .with_n_estimators(10)
            .with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let pa = a.predict(&x).unwrap();
        let pb = b.predict(&x).unwrap();
        for i in 0..pa.len() {
            assert_eq!(pa[i], pb[i]);
        }
    }

    #[test]
    fn test_unfitted_errors() {
        let (x, _) = step_data();
        let forest = RandomForest::new_regressor();
        assert!(matches!(
            forest.predict(&x),
            Err(DemandError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_importances_normalized() {
        let (x, y) = step_data();
        let mut forest = RandomForest::new_regressor()
            .with_n_estimators(15)
            .with_random_state(3);
        forest.fit(&x, &y).unwrap();

        let imp = forest.feature_importances().unwrap();
        assert_eq!(imp.len(), 3);
        assert!((imp.sum() - 1.0).abs() < 1e-6);
        assert!(imp[0] > imp[2]);
    }

    #[test]
    fn test_without_bootstrap() {
        let (x, y) = step_data();
        let mut forest = RandomForest::new_regressor()
            .with_n_estimators(5)
            .with_bootstrap(false)
            .with_max_features(MaxFeatures::All)
            .with_random_state(1);
        forest.fit(&x, &y).unwrap();

        let preds = forest.predict(&x).unwrap();
        // All trees see the full sample, so the fit is near exact
        for i in 0..40 {
            assert!((preds[i] - y[i]).abs() < 1e-6);
        }
    }
}
