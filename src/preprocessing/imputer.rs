//! Missing value imputation with train-fitted statistics

use crate::error::{DemandError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Imputation strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Column mean (numeric only)
    Mean,
    /// Column median (numeric only)
    Median,
    /// Most frequent value
    MostFrequent,
    /// Fixed numeric value
    Constant(f64),
}

/// Fill value learned for a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeValue {
    Numeric(f64),
    Text(String),
}

/// Imputer that learns fill values from training data and reuses them on
/// any later frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fill values learned during fit
    pub fn fill_values(&self) -> &HashMap<String, ImputeValue> {
        &self.fill_values
    }

    /// Learn fill values for the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.fill_values.clear();

        for &name in columns {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.to_string()))?;

            let fill = match col.dtype() {
                DataType::String => {
                    let ca = col.str()?;
                    match self.strategy {
                        ImputeStrategy::MostFrequent => mode_string(ca).map(ImputeValue::Text),
                        _ => {
                            return Err(DemandError::PreprocessingError(format!(
                                "strategy {:?} is not valid for categorical column '{}'",
                                self.strategy, name
                            )))
                        }
                    }
                }
                _ => {
                    let casted = col.cast(&DataType::Float64)?;
                    let ca = casted.f64()?;
                    match self.strategy {
                        ImputeStrategy::Mean => ca.mean().map(ImputeValue::Numeric),
                        ImputeStrategy::Median => ca.median().map(ImputeValue::Numeric),
                        ImputeStrategy::MostFrequent => {
                            mode_numeric(ca).map(ImputeValue::Numeric)
                        }
                        ImputeStrategy::Constant(v) => Some(ImputeValue::Numeric(v)),
                    }
                }
            };

            match fill {
                Some(value) => {
                    self.fill_values.insert(name.to_string(), value);
                }
                None => {
                    return Err(DemandError::PreprocessingError(format!(
                        "cannot compute fill value for column '{}' with no values",
                        name
                    )))
                }
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Fill missing values using the learned statistics
    ///
    /// Columns the imputer was not fitted on are left untouched; fitted
    /// columns missing from the frame are an error.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }

        let mut df = df.clone();

        for (name, fill) in &self.fill_values {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.clone()))?;

            let filled = match fill {
                // Always rebuilt as Float64 so fitted numeric columns
                // share a dtype whether or not this frame had gaps
                ImputeValue::Numeric(v) => {
                    let casted = col.cast(&DataType::Float64)?;
                    let ca = casted.f64()?;
                    let out: Float64Chunked =
                        ca.into_iter().map(|opt| Some(opt.unwrap_or(*v))).collect();
                    out.with_name(name.as_str().into()).into_series()
                }
                ImputeValue::Text(v) => {
                    if col.null_count() == 0 {
                        continue;
                    }
                    let ca = col.str()?;
                    let out: StringChunked = ca
                        .into_iter()
                        .map(|opt| Some(opt.unwrap_or(v.as_str()).to_string()))
                        .collect();
                    out.with_name(name.as_str().into()).into_series()
                }
            };

            df.with_column(filled)?;
        }

        Ok(df)
    }

    /// Fit on a frame and transform it in one call
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

/// Most frequent value of a numeric column; ties break toward the value
/// seen first
fn mode_numeric(ca: &Float64Chunked) -> Option<f64> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    let mut order: Vec<u64> = Vec::new();

    for v in ca.into_iter().flatten() {
        let key = v.to_bits();
        let entry = counts.entry(key).or_insert_with(|| {
            order.push(key);
            (v, 0)
        });
        entry.1 += 1;
    }

    let mut best: Option<(f64, usize)> = None;
    for key in order {
        let (v, count) = counts[&key];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((v, count));
        }
    }
    best.map(|(v, _)| v)
}

/// Most frequent value of a string column; ties break toward the value
/// seen first
fn mode_string(ca: &StringChunked) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for v in ca.into_iter().flatten() {
        let entry = counts.entry(v).or_insert_with(|| {
            order.push(v);
            0
        });
        *entry += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for v in order {
        let count = counts[v];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((v, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn df_with_nulls() -> DataFrame {
        df!(
            "qty" => &[Some(2.0f64), None, Some(4.0), Some(6.0)],
            "store" => &[Some("north"), Some("north"), None, Some("south")],
        )
        .unwrap()
    }

    #[test]
    fn test_mean_imputation() {
        let df = df_with_nulls();
        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        let out = imputer.fit_transform(&df, &["qty"]).unwrap();

        let qty = out.column("qty").unwrap().f64().unwrap();
        assert_eq!(qty.null_count(), 0);
        assert_eq!(qty.get(1), Some(4.0));
    }

    #[test]
    fn test_median_imputation() {
        let df = df!("x" => &[Some(1.0f64), Some(100.0), None, Some(2.0)]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let out = imputer.fit_transform(&df, &["x"]).unwrap();

        let x = out.column("x").unwrap().f64().unwrap();
        assert_eq!(x.get(2), Some(2.0));
    }

    #[test]
    fn test_mode_imputation_categorical() {
        let df = df_with_nulls();
        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        let out = imputer.fit_transform(&df, &["store"]).unwrap();

        let store = out.column("store").unwrap().str().unwrap();
        assert_eq!(store.null_count(), 0);
        assert_eq!(store.get(2), Some("north"));
    }

    #[test]
    fn test_mean_strategy_rejects_categorical() {
        let df = df_with_nulls();
        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        assert!(imputer.fit(&df, &["store"]).is_err());
    }

    #[test]
    fn test_transform_uses_training_statistics() {
        let train = df!("x" => &[Some(10.0f64), Some(20.0), Some(30.0)]).unwrap();
        let test = df!("x" => &[Some(1000.0f64), None]).unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::Mean);
        imputer.fit(&train, &["x"]).unwrap();
        let out = imputer.transform(&test).unwrap();

        // Fill comes from the training mean, not the test frame
        let x = out.column("x").unwrap().f64().unwrap();
        assert_eq!(x.get(1), Some(20.0));
    }

    #[test]
    fn test_transform_before_fit_errors() {
        let imputer = Imputer::new(ImputeStrategy::Mean);
        let df = df_with_nulls();
        assert!(matches!(
            imputer.transform(&df),
            Err(DemandError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_numeric_mode() {
        let df = df!("x" => &[Some(1.0f64), Some(2.0), Some(2.0), None]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        let out = imputer.fit_transform(&df, &["x"]).unwrap();

        let x = out.column("x").unwrap().f64().unwrap();
        assert_eq!(x.get(3), Some(2.0));
    }

    #[test]
    fn test_constant_imputation() {
        let df = df!("x" => &[Some(1.0f64), None]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Constant(-1.0));
        let out = imputer.fit_transform(&df, &["x"]).unwrap();

        let x = out.column("x").unwrap().f64().unwrap();
        assert_eq!(x.get(1), Some(-1.0));
    }
}
