//! CART regression tree
//!
//! Splits minimize weighted child variance. Candidate features are
//! scanned in parallel; within a feature the scan is a single sorted
//! pass with incremental sums.

use crate::error::{DemandError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

/// A node in the fitted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    /// Number of features considered per split; `None` means all.
    /// Typically set by the forest rather than directly.
    pub max_features: Option<usize>,
    /// Seed for the per-split feature subsample
    pub random_state: Option<u64>,
    root: Option<TreeNode>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    is_fitted: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_regressor()
    }
}

impl DecisionTree {
    pub fn new_regressor() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            root: None,
            n_features: 0,
            feature_importances: None,
            is_fitted: false,
        }
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

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the tree
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(DemandError::TrainingError(
                "cannot fit on empty data".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(DemandError::ShapeError {
                expected: format!("{} target values", x.nrows()),
                actual: format!("{}", y.len()),
            });
        }

        self.n_features = x.ncols();
        let mut importances = Array1::zeros(self.n_features);
        let mut rng = self.random_state.map(ChaCha8Rng::seed_from_u64);

        let indices: Vec<usize> = (0..x.nrows()).collect();
        let root = self.build_tree(x, y, &indices, 0, &mut importances, &mut rng);

        let total: f64 = importances.sum();
        if total > 0.0 {
            importances.mapv_inplace(|v| v / total);
        }

        self.root = Some(root);
        self.feature_importances = Some(importances);
        self.is_fitted = true;
        Ok(self)
    }

    /// Predict for each row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(DemandError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(DemandError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{}", x.ncols()),
            });
        }

        let mut out = Array1::zeros(x.nrows());
        for (i, row) in x.rows().into_iter().enumerate() {
            let mut node = root;
            loop {
                match node {
                    TreeNode::Leaf { value, .. } => {
                        out[i] = *value;
                        break;
                    }
                    TreeNode::Split {
                        feature_idx,
                        threshold,
                        left,
                        right,
                        ..
                    } => {
                        node = if row[*feature_idx] <= *threshold {
                            left
                        } else {
                            right
                        };
                    }
                }
            }
        }
        Ok(out)
    }

    /// Normalized split-gain importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Depth of the fitted tree
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Number of leaves in the fitted tree
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut Array1<f64>,
        rng: &mut Option<ChaCha8Rng>,
    ) -> TreeNode {
        let n = indices.len();
        let (mean, impurity) = mean_and_variance(y, indices);

        let at_max_depth = self.max_depth.map_or(false, |d| depth >= d);
        if at_max_depth || n < self.min_samples_split || impurity < MIN_GAIN {
            return TreeNode::Leaf {
                value: mean,
                n_samples: n,
            };
        }

        let split = match self.find_best_split(x, y, indices, impurity, rng) {
            Some(s) => s,
            None => {
                return TreeNode::Leaf {
                    value: mean,
                    n_samples: n,
                }
            }
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

        if left_idx.is_empty() || right_idx.is_empty() {
            return TreeNode::Leaf {
                value: mean,
                n_samples: n,
            };
        }

        importances[split.feature_idx] += n as f64 * split.gain;

        let left = self.build_tree(x, y, &left_idx, depth + 1, importances, rng);
        let right = self.build_tree(x, y, &right_idx, depth + 1, importances, rng);

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples: n,
            impurity,
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut Option<ChaCha8Rng>,
    ) -> Option<SplitCandidate> {
        let features = self.candidate_features(rng);

        features
            .par_iter()
            .filter_map(|&feature_idx| {
                self.scan_feature(x, y, indices, feature_idx, parent_impurity)
            })
            .max_by(|a, b| a.gain.total_cmp(&b.gain))
    }

    fn candidate_features(&self, rng: &mut Option<ChaCha8Rng>) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();

        if let Some(k) = self.max_features {
            if k < self.n_features {
                if let Some(rng) = rng.as_mut() {
                    features.shuffle(rng);
                    features.truncate(k);
                    features.sort_unstable();
                } else {
                    features.truncate(k);
                }
            }
        }
        features
    }

    /// Best threshold on one feature via a sorted single pass
    fn scan_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.min_samples_leaf;
        if n < 2 * min_leaf {
            return None;
        }

        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (x[[i, feature_idx]], y[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total_sum: f64 = pairs.iter().map(|(_, t)| t).sum();
        let total_sq: f64 = pairs.iter().map(|(_, t)| t * t).sum();

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let mut best: Option<SplitCandidate> = None;

        for i in 0..n {
            let (value, target) = pairs[i];
            if i >= min_leaf && i <= n - min_leaf {
                // Cannot split between equal feature values
                if (value - pairs[i - 1].0).abs() > MIN_GAIN {
                    let n_left = i as f64;
                    let n_right = (n - i) as f64;

                    let var_left = left_sq / n_left - (left_sum / n_left).powi(2);
                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let var_right = right_sq / n_right - (right_sum / n_right).powi(2);

                    let weighted = (n_left * var_left + n_right * var_right) / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > MIN_GAIN
                        && best.as_ref().map_or(true, |b| gain > b.gain)
                    {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (pairs[i - 1].0 + value) / 2.0,
                            gain,
                        });
                    }
                }
            }
            left_sum += target;
            left_sq += target * target;
        }

        best
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Returns (mean, variance) over the selected rows
fn mean_and_variance(y: &Array1<f64>, indices: &[usize]) -> (f64, f64) {
    if indices.is_empty() {
        return (0.0, 0.0);
    }
    let n = indices.len() as f64;
    let sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let mean = sum / n;
    (mean, (sq / n - mean * mean).max(0.0))
}
