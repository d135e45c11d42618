//! Seeded train/test splitting

use crate::error::{DemandError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Configuration for the train/test split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_fraction: f64,
    /// RNG seed for the shuffle
    pub seed: u64,
    /// Shuffle rows before splitting
    pub shuffle: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            shuffle: true,
        }
    }
}

impl SplitConfig {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction,
            seed,
            shuffle: true,
        }
    }
}

/// Split a DataFrame into disjoint train and test frames
///
/// Row order within each part follows the shuffled index order. Both
/// parts are guaranteed non-empty; fractions that would produce an empty
/// part on small inputs are clamped to leave at least one row each.
pub fn train_test_split(df: &DataFrame, config: &SplitConfig) -> Result<(DataFrame, DataFrame)> {
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return Err(DemandError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: format!("{}", config.test_fraction),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n = df.height();
    if n < 2 {
        return Err(DemandError::DataError(format!(
            "need at least 2 rows to split, got {}",
            n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    if config.shuffle {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        indices.shuffle(&mut rng);
    }

    let n_test = ((n as f64 * config.test_fraction).round() as usize).clamp(1, n - 1);
    let (test_idx, train_idx) = indices.split_at(n_test);

    let train = take_rows(df, train_idx)?;
    let test = take_rows(df, test_idx)?;

    tracing::info!(
        train_rows = train.height(),
        test_rows = test.height(),
        seed = config.seed,
        "split dataset"
    );

    Ok((train, test))
}

fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: IdxCa = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}
