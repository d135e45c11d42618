//! K-fold cross validation

use crate::error::{DemandError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One fold's index split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl Default for KFold {
    fn default() -> Self {
        Self::new(5)
    }
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self.shuffle = true;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Produce the fold index splits for `n` samples
    pub fn split(&self, n: usize) -> Result<Vec<CVSplit>> {
        if self.n_splits < 2 {
            return Err(DemandError::InvalidParameter {
                name: "n_splits".to_string(),
                value: format!("{}", self.n_splits),
                reason: "need at least 2 folds".to_string(),
            });
        }
        if n < self.n_splits {
            return Err(DemandError::ValidationError(format!(
                "cannot split {} samples into {} folds",
                n, self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        if self.shuffle {
            let mut rng = match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }

        // First `remainder` folds take one extra sample
        let base = n / self.n_splits;
        let remainder = n % self.n_splits;

        let mut splits = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold_idx in 0..self.n_splits {
            let size = if fold_idx < remainder { base + 1 } else { base };
            let end = start + size;

            let test_indices: Vec<usize> = indices[start..end].to_vec();
            let train_indices: Vec<usize> = indices[..start]
                .iter()
                .chain(indices[end..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            start = end;
        }
        Ok(splits)
    }
}

/// Aggregated fold scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len() as f64;
        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / n
        };
        let std = if scores.len() < 2 {
            0.0
        } else {
            let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
            var.sqrt()
        };
        Self {
            scores,
            mean_score: mean,
            std_score: std,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_folds_partition_everything() {
        let kfold = KFold::new(3);
        let splits = kfold.split(10).unwrap();
        assert_eq!(splits.len(), 3);

        let mut seen = HashSet::new();
        for split in &splits {
            for &i in &split.test_indices {
                assert!(seen.insert(i), "index {} appears in two test folds", i);
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_train_and_test_disjoint() {
        let kfold = KFold::new(4);
        for split in kfold.split(17).unwrap() {
            let test: HashSet<usize> = split.test_indices.iter().copied().collect();
            assert!(split.train_indices.iter().all(|i| !test.contains(i)));
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 17);
        }
    }

    #[test]
    fn test_remainder_spread_over_first_folds() {
        let kfold = KFold::new(3);
        let splits = kfold.split(10).unwrap();
        // 10 = 4 + 3 + 3
        assert_eq!(splits[0].test_indices.len(), 4);
        assert_eq!(splits[1].test_indices.len(), 3);
        assert_eq!(splits[2].test_indices.len(), 3);
    }

    #[test]
    fn test_shuffle_reproducible() {
        let a = KFold::new(3).with_random_state(42).split(12).unwrap();
        let b = KFold::new(3).with_random_state(42).split(12).unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_too_few_samples_errors() {
        let kfold = KFold::new(5);
        assert!(kfold.split(3).is_err());
    }

    #[test]
    fn test_single_fold_rejected() {
        let kfold = KFold::new(1);
        assert!(kfold.split(10).is_err());
    }

    #[test]
    fn test_cv_results_statistics() {
        let results = CVResults::from_scores(vec![1.0, 2.0, 3.0]);
        assert!((results.mean_score - 2.0).abs() < 1e-12);
        // Population std of [1, 2, 3]
        assert!((results.std_score - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }
}
