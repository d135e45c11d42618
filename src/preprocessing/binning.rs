//! Quartile banding for skewed numeric columns

use crate::error::{DemandError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BAND_LABELS: [&str; 4] = ["Low", "LowerMiddle", "UpperMiddle", "High"];

/// Replaces numeric columns with four quartile bands
///
/// Band edges are the training quartiles, so the same raw value maps to
/// the same band at train and predict time. The banded column is named
/// `{col}_band` and the original column is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuartileBinner {
    edges: HashMap<String, [f64; 3]>,
    is_fitted: bool,
}

impl Default for QuartileBinner {
    fn default() -> Self {
        Self::new()
    }
}

impl QuartileBinner {
    pub fn new() -> Self {
        Self {
            edges: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn edges(&self) -> &HashMap<String, [f64; 3]> {
        &self.edges
    }

    /// Learn quartile edges for the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.edges.clear();

        for &name in columns {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.to_string()))?;
            let casted = col.cast(&DataType::Float64)?;
            let ca = casted.f64()?;

            let mut values: Vec<f64> = ca.into_iter().flatten().filter(|v| v.is_finite()).collect();
            if values.is_empty() {
                return Err(DemandError::PreprocessingError(format!(
                    "cannot band column '{}' with no values",
                    name
                )));
            }
            values.sort_by(|a, b| a.total_cmp(b));

            let q1 = values[values.len() / 4];
            let q2 = values[values.len() / 2];
            let q3 = values[(values.len() * 3) / 4];
            self.edges.insert(name.to_string(), [q1, q2, q3]);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace fitted columns with their band labels
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }

        let mut df = df.clone();

        // Sorted so banded columns land in a stable order
        let mut names: Vec<&String> = self.edges.keys().collect();
        names.sort();

        for name in names {
            let edges = &self.edges[name];
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.clone()))?;
            let casted = col.cast(&DataType::Float64)?;
            let ca = casted.f64()?;

            let bands: StringChunked = ca
                .into_iter()
                .map(|opt| opt.map(|v| band_label(v, edges).to_string()))
                .collect();

            df.with_column(
                bands
                    .with_name(format!("{}_band", name).into())
                    .into_series(),
            )?;
            df = df.drop(name)?;
        }

        Ok(df)
    }

    /// Fit on a frame and band it in one call
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

fn band_label(v: f64, edges: &[f64; 3]) -> &'static str {
    if v <= edges[0] {
        BAND_LABELS[0]
    } else if v <= edges[1] {
        BAND_LABELS[1]
    } else if v <= edges[2] {
        BAND_LABELS[2]
    } else {
        BAND_LABELS[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banding() {
        let values: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let df = df!("income" => values).unwrap();

        let mut binner = QuartileBinner::new();
        let out = binner.fit_transform(&df, &["income"]).unwrap();

        assert!(!out
            .get_column_names()
            .iter()
            .any(|c| c.as_str() == "income"));

        let bands = out.column("income_band").unwrap().str().unwrap();
        assert_eq!(bands.get(0), Some("Low"));
        assert_eq!(bands.get(99), Some("High"));
    }

    #[test]
    fn test_edges_reused_on_new_frame() {
        let train = df!("income" => (1..=100).map(|i| i as f64).collect::<Vec<_>>()).unwrap();
        let mut binner = QuartileBinner::new();
        binner.fit(&train, &["income"]).unwrap();

        // Values beyond the training range still map into the bands
        let test = df!("income" => &[0.5f64, 1e6]).unwrap();
        let out = binner.transform(&test).unwrap();

        let bands = out.column("income_band").unwrap().str().unwrap();
        assert_eq!(bands.get(0), Some("Low"));
        assert_eq!(bands.get(1), Some("High"));
    }

    #[test]
    fn test_nulls_stay_null() {
        let df = df!("income" => &[Some(1.0f64), Some(2.0), Some(3.0), Some(4.0), None]).unwrap();
        let mut binner = QuartileBinner::new();
        let out = binner.fit_transform(&df, &["income"]).unwrap();

        let bands = out.column("income_band").unwrap().str().unwrap();
        assert_eq!(bands.null_count(), 1);
    }

    #[test]
    fn test_constant_column() {
        let df = df!("income" => &[5.0f64, 5.0, 5.0, 5.0]).unwrap();
        let mut binner = QuartileBinner::new();
        let out = binner.fit_transform(&df, &["income"]).unwrap();

        let bands = out.column("income_band").unwrap().str().unwrap();
        for v in bands.into_iter().flatten() {
            assert_eq!(v, "Low");
        }
    }
}
