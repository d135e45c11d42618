//! Configuration for the fitted feature pipeline

use super::{ImputeStrategy, ScalerType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for [`super::FeaturePipeline`]
///
/// Defaults mirror the standard demand-forecasting setup: mean
/// imputation for numerics, mode for categoricals, IQR clipping at 1.5,
/// one-hot below ten distinct values, correlation pruning at 0.9, and
/// min-max scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Imputation strategy for numeric columns
    pub numeric_impute: ImputeStrategy,
    /// Imputation strategy for categorical columns
    pub categorical_impute: ImputeStrategy,
    /// IQR multiplier for outlier clipping
    pub iqr_multiplier: f64,
    /// Clip outliers in numeric feature columns
    pub clip_outliers: bool,
    /// Maximum distinct values for one-hot encoding; higher
    /// cardinalities fall back to target encoding
    pub max_onehot_cardinality: usize,
    /// Ranked category orders for ordinal columns
    pub ordinal_orders: HashMap<String, Vec<String>>,
    /// Encode unseen ordinal categories as this value instead of
    /// returning an error
    pub ordinal_unknown_sentinel: Option<i32>,
    /// Absolute correlation above which one of a feature pair is pruned
    pub correlation_threshold: f64,
    /// Prune highly correlated features
    pub prune_correlated: bool,
    /// Numeric columns replaced by quartile bands
    pub band_columns: Vec<String>,
    /// Scaler applied to feature columns
    pub scaler: ScalerType,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_impute: ImputeStrategy::Mean,
            categorical_impute: ImputeStrategy::MostFrequent,
            iqr_multiplier: 1.5,
            clip_outliers: true,
            max_onehot_cardinality: 10,
            ordinal_orders: HashMap::new(),
            ordinal_unknown_sentinel: None,
            correlation_threshold: 0.9,
            prune_correlated: true,
            band_columns: Vec::new(),
            scaler: ScalerType::MinMax,
        }
    }
}

impl PreprocessingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the numeric imputation strategy
    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute = strategy;
        self
    }

    /// Set the categorical imputation strategy
    pub fn with_categorical_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.categorical_impute = strategy;
        self
    }

    /// Set the IQR multiplier used for clip bounds
    pub fn with_iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = multiplier;
        self
    }

    /// Enable or disable outlier clipping
    pub fn with_clip_outliers(mut self, clip: bool) -> Self {
        self.clip_outliers = clip;
        self
    }

    /// Set the one-hot cardinality threshold
    pub fn with_max_onehot_cardinality(mut self, max: usize) -> Self {
        self.max_onehot_cardinality = max;
        self
    }

    /// Declare a ranked ordinal column
    pub fn with_ordinal_order(
        mut self,
        column: impl Into<String>,
        order: Vec<impl Into<String>>,
    ) -> Self {
        self.ordinal_orders.insert(
            column.into(),
            order.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Map unseen ordinal categories to a sentinel instead of erroring
    pub fn with_ordinal_unknown_sentinel(mut self, sentinel: i32) -> Self {
        self.ordinal_unknown_sentinel = Some(sentinel);
        self
    }

    /// Set the correlation pruning threshold
    pub fn with_correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = threshold;
        self
    }

    /// Enable or disable correlation pruning
    pub fn with_prune_correlated(mut self, prune: bool) -> Self {
        self.prune_correlated = prune;
        self
    }

    /// Replace a numeric column with quartile bands
    pub fn with_band_column(mut self, column: impl Into<String>) -> Self {
        self.band_columns.push(column.into());
        self
    }

    /// Set the feature scaler
    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }
}
