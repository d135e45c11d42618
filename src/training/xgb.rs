//! XGBoost-style gradient boosting with second-order approximation
//!
//! Squared-error loss, so grad = pred - y and hess = 1. Leaf weights
//! are regularized, w* = -G / (H + lambda), and splits are scored by
//! Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)],
//! accepted only when the gain clears gamma.

use crate::error::{DemandError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Booster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum required in each child
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XgbConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XgbNode {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XgbNode>,
        right: Box<XgbNode>,
    },
}

impl XgbNode {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            XgbNode::Leaf { weight } => *weight,
            XgbNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// XGBoost-style regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbRegressor {
    config: XgbConfig,
    trees: Vec<XgbNode>,
    base_score: f64,
    n_features: usize,
    is_fitted: bool,
}

impl Default for XgbRegressor {
    fn default() -> Self {
        Self::new(XgbConfig::default())
    }
}

impl XgbRegressor {
    pub fn new(config: XgbConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &XgbConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
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
        if self.config.learning_rate <= 0.0 {
            return Err(DemandError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: format!("{}", self.config.learning_rate),
                reason: "must be positive".to_string(),
            });
        }
        if self.config.subsample <= 0.0 || self.config.subsample > 1.0 {
            return Err(DemandError::InvalidParameter {
                name: "subsample".to_string(),
                value: format!("{}", self.config.subsample),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        if self.config.colsample_bytree <= 0.0 || self.config.colsample_bytree > 1.0 {
            return Err(DemandError::InvalidParameter {
                name: "colsample_bytree".to_string(),
                value: format!("{}", self.config.colsample_bytree),
                reason: "must be in (0, 1]".to_string(),
            });
        }

        self.n_features = x.ncols();
        self.base_score = y.mean().unwrap_or(0.0);
        let mut preds = Array1::from_elem(n, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            // Squared error: grad = pred - y, hess = 1
            let grad: Array1<f64> = &preds - y;
            let hess = Array1::from_elem(n, 1.0);

            let rows = sample_indices(&mut rng, n, self.config.subsample);
            let cols = sample_indices(&mut rng, self.n_features, self.config.colsample_bytree);

            let tree = build_tree(x, &grad, &hess, &rows, &cols, 0, &self.config);

            for i in 0..n {
                preds[i] += self.config.learning_rate * tree.predict(x.row(i));
            }
            self.trees.push(tree);
        }

        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(DemandError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{}", x.ncols()),
            });
        }

        let mut preds = Array1::from_elem(x.nrows(), self.base_score);
        for i in 0..x.nrows() {
            let row = x.row(i);
            for tree in &self.trees {
                preds[i] += self.config.learning_rate * tree.predict(row);
            }
        }
        Ok(preds)
    }

    /// Split-count importances, normalized over all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            count_splits(tree, &mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(Array1::from_vec(counts))
    }
}

fn build_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XgbConfig,
) -> XgbNode {
    let n = indices.len();
    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XgbNode::Leaf {
            weight: leaf_weight,
        };
    }

    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.gain.total_cmp(&b.gain));

    match best_split {
        Some(split) if split.gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, split.feature]] <= split.threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XgbNode::Leaf {
                    weight: leaf_weight,
                };
            }

            let left = build_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XgbNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XgbNode::Leaf {
            weight: leaf_weight,
        },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        // Soft-threshold for L1
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

struct FeatureSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Exact greedy split scan over one feature
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XgbConfig,
) -> Option<FeatureSplit> {
    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| hess[i]).sum();
    let lambda = config.reg_lambda;

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<FeatureSplit> = None;

    for (pos, &idx) in sorted.iter().enumerate() {
        g_left += grad[idx];
        h_left += hess[idx];

        let Some(&next_idx) = sorted.get(pos + 1) else {
            break;
        };
        // Cannot split between equal feature values
        if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda)
                + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.as_ref().map_or(true, |b| gain > b.gain) {
            best = Some(FeatureSplit {
                feature,
                threshold: (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0,
                gain,
            });
        }
    }

    best
}

fn count_splits(node: &XgbNode, counts: &mut [f64]) {
    match node {
        XgbNode::Leaf { .. } => {}
        XgbNode::Split {
            feature,
            left,
            right,
            ..
        } => {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            count_splits(left, counts);
            count_splits(right, counts);
        }
    }
}

fn sample_indices(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
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
