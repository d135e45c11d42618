//! Preprocessing for retail transaction tables
//!
//! Two layers:
//! - [`TableCleaner`] applies structural, row-local cleaning to the raw
//!   export (duplicate removal, identifier drops, date expansion, log
//!   transforms, flag coercion).
//! - [`FeaturePipeline`] applies everything that must be fitted on
//!   training data only: imputation, income banding, outlier clipping,
//!   categorical encoding, correlation pruning, and scaling.

mod binning;
mod clean;
mod config;
mod correlation;
mod encoder;
mod imputer;
mod outlier;
mod pipeline;
mod scaler;

pub use binning::QuartileBinner;
pub use clean::{CleanConfig, TableCleaner};
pub use config::PreprocessingConfig;
pub use correlation::CorrelationPruner;
pub use encoder::{CategoryEncoder, EncodeMethod};
pub use imputer::{ImputeStrategy, ImputeValue, Imputer};
pub use outlier::{ClipBounds, IqrClipper};
pub use pipeline::FeaturePipeline;
pub use scaler::{Scaler, ScalerParams, ScalerType};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Column type classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
    Unknown,
}

/// Classify a column by its dtype
pub fn column_type(dtype: &DataType) -> ColumnType {
    match dtype {
        DataType::Float64
        | DataType::Float32
        | DataType::Int64
        | DataType::Int32
        | DataType::Int16
        | DataType::Int8
        | DataType::UInt64
        | DataType::UInt32
        | DataType::UInt16
        | DataType::UInt8
        | DataType::Boolean => ColumnType::Numeric,
        DataType::String => ColumnType::Categorical,
        _ => ColumnType::Unknown,
    }
}

/// Per-column summary statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStats {
    pub name: String,
    pub dtype: String,
    pub count: usize,
    pub null_count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub unique_count: Option<usize>,
}

impl FeatureStats {
    /// Summarize a numeric column
    pub fn from_numeric(name: &str, ca: &Float64Chunked) -> Self {
        Self {
            name: name.to_string(),
            dtype: "numeric".to_string(),
            count: ca.len(),
            null_count: ca.null_count(),
            mean: ca.mean(),
            std: ca.std(1),
            min: ca.min(),
            max: ca.max(),
            unique_count: None,
        }
    }

    /// Summarize a categorical column
    pub fn from_categorical(name: &str, ca: &StringChunked) -> Self {
        let unique: std::collections::HashSet<&str> = ca.into_iter().flatten().collect();
        Self {
            name: name.to_string(),
            dtype: "categorical".to_string(),
            count: ca.len(),
            null_count: ca.null_count(),
            mean: None,
            std: None,
            min: None,
            max: None,
            unique_count: Some(unique.len()),
        }
    }
}

/// Compute summary statistics for every column in a frame
pub fn summarize(df: &DataFrame) -> crate::error::Result<Vec<FeatureStats>> {
    let mut stats = Vec::with_capacity(df.width());

    for col in df.get_columns() {
        match column_type(col.dtype()) {
            ColumnType::Numeric => {
                let casted = col.cast(&DataType::Float64)?;
                stats.push(FeatureStats::from_numeric(col.name(), casted.f64()?));
            }
            ColumnType::Categorical => {
                stats.push(FeatureStats::from_categorical(col.name(), col.str()?));
            }
            ColumnType::Unknown => {}
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_classification() {
        assert_eq!(column_type(&DataType::Float64), ColumnType::Numeric);
        assert_eq!(column_type(&DataType::Int64), ColumnType::Numeric);
        assert_eq!(column_type(&DataType::Boolean), ColumnType::Numeric);
        assert_eq!(column_type(&DataType::String), ColumnType::Categorical);
    }

    #[test]
    fn test_summarize() {
        let df = df!(
            "price" => &[1.0f64, 2.0, 3.0],
            "store" => &["north", "south", "north"],
        )
        .unwrap();

        let stats = summarize(&df).unwrap();
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].name, "price");
        assert_eq!(stats[0].mean, Some(2.0));

        assert_eq!(stats[1].name, "store");
        assert_eq!(stats[1].unique_count, Some(2));
    }
}
