//! IQR outlier clipping
//!
//! Outliers are clipped to the quartile fence rather than removed, so
//! row counts and row identity are preserved through the pipeline.

use crate::error::{DemandError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Clip bounds learned for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipBounds {
    pub lower: f64,
    pub upper: f64,
    pub q1: f64,
    pub q3: f64,
}

/// Clips numeric columns to `[Q1 - k*IQR, Q3 + k*IQR]`
///
/// Bounds are learned once on training data and applied unchanged to
/// any later frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IqrClipper {
    multiplier: f64,
    bounds: HashMap<String, ClipBounds>,
    is_fitted: bool,
}

impl IqrClipper {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            bounds: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Bounds learned during fit
    pub fn bounds(&self) -> &HashMap<String, ClipBounds> {
        &self.bounds
    }

    /// Learn clip bounds for the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        if self.multiplier <= 0.0 {
            return Err(DemandError::InvalidParameter {
                name: "iqr_multiplier".to_string(),
                value: format!("{}", self.multiplier),
                reason: "must be positive".to_string(),
            });
        }

        self.bounds.clear();

        for &name in columns {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.to_string()))?;
            let casted = col.cast(&DataType::Float64)?;
            let ca = casted.f64()?;

            let mut values: Vec<f64> = ca.into_iter().flatten().filter(|v| v.is_finite()).collect();
            if values.is_empty() {
                continue;
            }
            values.sort_by(|a, b| a.total_cmp(b));

            let q1 = values[values.len() / 4];
            let q3 = values[(values.len() * 3) / 4];
            let iqr = q3 - q1;

            self.bounds.insert(
                name.to_string(),
                ClipBounds {
                    lower: q1 - self.multiplier * iqr,
                    upper: q3 + self.multiplier * iqr,
                    q1,
                    q3,
                },
            );
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Clip fitted columns to their learned bounds
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }

        let mut df = df.clone();

        for (name, bounds) in &self.bounds {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.clone()))?;
            let casted = col.cast(&DataType::Float64)?;
            let ca = casted.f64()?;

            let clipped: Float64Chunked = ca
                .into_iter()
                .map(|opt| opt.map(|v| v.max(bounds.lower).min(bounds.upper)))
                .collect();

            df.with_column(clipped.with_name(name.as_str().into()).into_series())?;
        }

        Ok(df)
    }

    /// Fit on a frame and clip it in one call
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Count values outside the learned bounds, per column
    pub fn count_outliers(&self, df: &DataFrame) -> Result<HashMap<String, usize>> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }

        let mut counts = HashMap::new();
        for (name, bounds) in &self.bounds {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.clone()))?;
            let casted = col.cast(&DataType::Float64)?;
            let n = casted
                .f64()?
                .into_iter()
                .flatten()
                .filter(|&v| v < bounds.lower || v > bounds.upper)
                .count();
            counts.insert(name.clone(), n);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn df_with_outlier() -> DataFrame {
        let mut values: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        values.push(1000.0);
        df!("x" => values).unwrap()
    }

    #[test]
    fn test_fit_bounds() {
        let df = df_with_outlier();
        let mut clipper = IqrClipper::new(1.5);
        clipper.fit(&df, &["x"]).unwrap();

        let bounds = &clipper.bounds()["x"];
        assert!(bounds.q1 < bounds.q3);
        assert_eq!(bounds.lower, bounds.q1 - 1.5 * (bounds.q3 - bounds.q1));
        assert_eq!(bounds.upper, bounds.q3 + 1.5 * (bounds.q3 - bounds.q1));
    }

    #[test]
    fn test_transform_clips_to_bounds() {
        let df = df_with_outlier();
        let mut clipper = IqrClipper::new(1.5);
        let out = clipper.fit_transform(&df, &["x"]).unwrap();

        let bounds = clipper.bounds()["x"].clone();
        let x = out.column("x").unwrap().f64().unwrap();

        for v in x.into_iter().flatten() {
            assert!(v >= bounds.lower && v <= bounds.upper);
        }
        // Row count unchanged: values are clipped, not removed
        assert_eq!(out.height(), df.height());
    }

    #[test]
    fn test_inlier_values_unchanged() {
        let df = df_with_outlier();
        let mut clipper = IqrClipper::new(1.5);
        let out = clipper.fit_transform(&df, &["x"]).unwrap();

        let x = out.column("x").unwrap().f64().unwrap();
        assert_eq!(x.get(4), Some(5.0));
    }

    #[test]
    fn test_bounds_reused_on_new_frame() {
        let train = df_with_outlier();
        let mut clipper = IqrClipper::new(1.5);
        clipper.fit(&train, &["x"]).unwrap();

        let upper = clipper.bounds()["x"].upper;
        let test = df!("x" => &[5.0f64, 500.0]).unwrap();
        let out = clipper.transform(&test).unwrap();

        let x = out.column("x").unwrap().f64().unwrap();
        assert_eq!(x.get(0), Some(5.0));
        assert_eq!(x.get(1), Some(upper));
    }

    #[test]
    fn test_count_outliers() {
        let df = df_with_outlier();
        let mut clipper = IqrClipper::new(1.5);
        clipper.fit(&df, &["x"]).unwrap();

        let counts = clipper.count_outliers(&df).unwrap();
        assert_eq!(counts["x"], 1);
    }

    #[test]
    fn test_invalid_multiplier() {
        let df = df_with_outlier();
        let mut clipper = IqrClipper::new(0.0);
        assert!(clipper.fit(&df, &["x"]).is_err());
    }

    #[test]
    fn test_transform_before_fit_errors() {
        let clipper = IqrClipper::new(1.5);
        let df = df_with_outlier();
        assert!(matches!(
            clipper.transform(&df),
            Err(DemandError::ModelNotFitted)
        ));
    }
}
