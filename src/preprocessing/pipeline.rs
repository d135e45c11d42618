//! Fitted preprocessing pipeline
//!
//! Runs imputation, banding, outlier clipping, encoding, correlation
//! pruning, and scaling as one unit. Every statistic is learned in
//! [`FeaturePipeline::fit`] from the training frame alone; `transform`
//! replays the learned parameters on any frame, so test data never
//! influences the fitted state.

use super::{
    column_type, CategoryEncoder, ColumnType, CorrelationPruner, Imputer, IqrClipper,
    PreprocessingConfig, QuartileBinner, Scaler,
};
use crate::error::{DemandError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Train-fitted feature pipeline
///
/// Stage order: impute, band, clip, encode, prune, scale. The target
/// column is carried through untouched; only feature columns are fitted
/// and transformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePipeline {
    config: PreprocessingConfig,
    target_column: String,
    numeric_imputer: Imputer,
    categorical_imputer: Imputer,
    binner: QuartileBinner,
    clipper: IqrClipper,
    encoder: CategoryEncoder,
    pruner: CorrelationPruner,
    scaler: Scaler,
    feature_names: Vec<String>,
    is_fitted: bool,
}

impl FeaturePipeline {
    pub fn new(target_column: impl Into<String>, config: PreprocessingConfig) -> Self {
        let encoder = CategoryEncoder::new(config.max_onehot_cardinality)
            .with_ordinal_orders(config.ordinal_orders.clone())
            .with_ordinal_unknown_sentinel(config.ordinal_unknown_sentinel);

        Self {
            numeric_imputer: Imputer::new(config.numeric_impute),
            categorical_imputer: Imputer::new(config.categorical_impute),
            binner: QuartileBinner::new(),
            clipper: IqrClipper::new(config.iqr_multiplier),
            encoder,
            pruner: CorrelationPruner::new(config.correlation_threshold),
            scaler: Scaler::new(config.scaler),
            target_column: target_column.into(),
            config,
            feature_names: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Final feature schema, in output order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Features dropped by correlation pruning
    pub fn pruned_features(&self) -> &[String] {
        self.pruner.dropped()
    }

    /// Fit every stage on the training frame and return it transformed
    pub fn fit_transform(&mut self, train: &DataFrame) -> Result<DataFrame> {
        let (numeric_cols, categorical_cols) = self.classify_columns(train)?;

        tracing::info!(
            numeric = numeric_cols.len(),
            categorical = categorical_cols.len(),
            "fitting feature pipeline"
        );

        // Imputation learns training statistics only
        self.numeric_imputer
            .fit(train, &as_strs(&numeric_cols))?;
        self.categorical_imputer
            .fit(train, &as_strs(&categorical_cols))?;

        let mut df = self.numeric_imputer.transform(train)?;
        df = self.categorical_imputer.transform(&df)?;

        // Quartile banding turns configured numerics into categoricals
        let band_cols: Vec<String> = self
            .config
            .band_columns
            .iter()
            .filter(|c| numeric_cols.contains(c))
            .cloned()
            .collect();
        self.binner.fit(&df, &as_strs(&band_cols))?;
        df = self.binner.transform(&df)?;

        let clip_cols: Vec<String> = numeric_cols
            .iter()
            .filter(|c| !band_cols.contains(c))
            .cloned()
            .collect();
        if self.config.clip_outliers {
            self.clipper.fit(&df, &as_strs(&clip_cols))?;
            let clipped: usize = self.clipper.count_outliers(&df)?.values().sum();
            tracing::debug!(values = clipped, "clipping outliers to train fences");
            df = self.clipper.transform(&df)?;
        }

        let mut encode_cols = categorical_cols.clone();
        encode_cols.extend(band_cols.iter().map(|c| format!("{}_band", c)));

        let target = df
            .column(&self.target_column)?
            .as_materialized_series()
            .clone();
        self.encoder
            .fit_with_target(&df, &as_strs(&encode_cols), &target)?;
        df = self.encoder.transform(&df)?;

        let encoded_features = self.feature_columns_of(&df)?;
        if self.config.prune_correlated {
            self.pruner.fit(&df, &as_strs(&encoded_features))?;
            df = self.pruner.transform(&df)?;
        }

        let final_features = self.feature_columns_of(&df)?;
        self.scaler.fit(&df, &as_strs(&final_features))?;
        df = self.scaler.transform(&df)?;

        self.verify_numeric(&df)?;
        self.feature_names = final_features;
        self.is_fitted = true;

        tracing::info!(
            features = self.feature_names.len(),
            pruned = self.pruner.dropped().len(),
            "feature pipeline fitted"
        );

        Ok(df)
    }

    /// Fit on the training frame, discarding the transformed output
    pub fn fit(&mut self, train: &DataFrame) -> Result<&mut Self> {
        self.fit_transform(train)?;
        Ok(self)
    }

    /// Replay the fitted stages on a frame
    ///
    /// The frame must carry every raw feature column seen at fit time;
    /// the target column is optional and passes through untouched.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }

        let mut df = self.numeric_imputer.transform(df)?;
        df = self.categorical_imputer.transform(&df)?;
        df = self.binner.transform(&df)?;
        if self.config.clip_outliers {
            df = self.clipper.transform(&df)?;
        }
        df = self.encoder.transform(&df)?;
        if self.config.prune_correlated {
            df = self.pruner.transform(&df)?;
        }
        df = self.scaler.transform(&df)?;

        for name in &self.feature_names {
            if !has_column(&df, name) {
                return Err(DemandError::ColumnNotFound(name.clone()));
            }
        }
        self.verify_numeric(&df)?;

        Ok(df)
    }

    /// Serialize the fitted pipeline to JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a fitted pipeline from JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let pipeline: Self = serde_json::from_str(&json)?;
        Ok(pipeline)
    }

    /// Split frame columns into numeric and categorical feature lists
    fn classify_columns(&self, df: &DataFrame) -> Result<(Vec<String>, Vec<String>)> {
        if !has_column(df, &self.target_column) {
            return Err(DemandError::ColumnNotFound(self.target_column.clone()));
        }

        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for col in df.get_columns() {
            let name = col.name().to_string();
            if name == self.target_column {
                if column_type(col.dtype()) != ColumnType::Numeric {
                    return Err(DemandError::PreprocessingError(format!(
                        "target column '{}' must be numeric, found {:?}",
                        name,
                        col.dtype()
                    )));
                }
                continue;
            }

            match column_type(col.dtype()) {
                ColumnType::Numeric => numeric.push(name),
                ColumnType::Categorical => categorical.push(name),
                ColumnType::Unknown => {
                    return Err(DemandError::PreprocessingError(format!(
                        "column '{}' has unsupported dtype {:?}",
                        name,
                        col.dtype()
                    )))
                }
            }
        }

        Ok((numeric, categorical))
    }

    /// All non-target columns of a frame, in schema order
    fn feature_columns_of(&self, df: &DataFrame) -> Result<Vec<String>> {
        Ok(df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != self.target_column)
            .map(|s| s.to_string())
            .collect())
    }

    /// Every non-target column must be numeric after encoding
    fn verify_numeric(&self, df: &DataFrame) -> Result<()> {
        for col in df.get_columns() {
            if col.name().as_str() == self.target_column {
                continue;
            }
            if column_type(col.dtype()) != ColumnType::Numeric {
                return Err(DemandError::PreprocessingError(format!(
                    "column '{}' is still {:?} after encoding",
                    col.name(),
                    col.dtype()
                )));
            }
        }
        Ok(())
    }
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(|s| s.as_str()).collect()
}
