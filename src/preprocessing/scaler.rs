//! Feature scaling with train-fitted parameters

use crate::error::{DemandError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scaling method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// No scaling
    None,
    /// Zero mean, unit variance
    Standard,
    /// Scale to [0, 1] by min and range
    MinMax,
    /// Median center, IQR scale
    Robust,
}

/// Per-column scaling parameters: `scaled = (value - center) / scale`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    pub center: f64,
    pub scale: f64,
}

/// Scaler fitted on training columns and reused on later frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: HashMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn params(&self) -> &HashMap<String, ScalerParams> {
        &self.params
    }

    /// Learn scaling parameters for the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.params.clear();

        if self.scaler_type == ScalerType::None {
            self.is_fitted = true;
            return Ok(self);
        }

        for &name in columns {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.to_string()))?;
            let casted = col.cast(&DataType::Float64)?;
            let ca = casted.f64()?;

            let params = match self.scaler_type {
                ScalerType::Standard => {
                    let center = ca.mean().unwrap_or(0.0);
                    let scale = ca.std(1).unwrap_or(1.0);
                    ScalerParams { center, scale }
                }
                ScalerType::MinMax => {
                    let min = ca.min().unwrap_or(0.0);
                    let max = ca.max().unwrap_or(1.0);
                    ScalerParams {
                        center: min,
                        scale: max - min,
                    }
                }
                ScalerType::Robust => {
                    let center = ca.median().unwrap_or(0.0);
                    let q1 = ca.quantile(0.25, QuantileMethod::Linear)?.unwrap_or(0.0);
                    let q3 = ca.quantile(0.75, QuantileMethod::Linear)?.unwrap_or(0.0);
                    ScalerParams {
                        center,
                        scale: q3 - q1,
                    }
                }
                ScalerType::None => unreachable!(),
            };

            self.params.insert(name.to_string(), normalize(params));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale fitted columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }
        if self.scaler_type == ScalerType::None {
            return Ok(df.clone());
        }

        let mut df = df.clone();
        for (name, params) in &self.params {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.clone()))?;
            let casted = col.cast(&DataType::Float64)?;
            let ca = casted.f64()?;

            let scaled: Float64Chunked = ca
                .into_iter()
                .map(|opt| opt.map(|v| (v - params.center) / params.scale))
                .collect();
            df.with_column(scaled.with_name(name.as_str().into()).into_series())?;
        }

        Ok(df)
    }

    /// Undo scaling on fitted columns
    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(DemandError::ModelNotFitted);
        }
        if self.scaler_type == ScalerType::None {
            return Ok(df.clone());
        }

        let mut df = df.clone();
        for (name, params) in &self.params {
            let col = df
                .column(name)
                .map_err(|_| DemandError::ColumnNotFound(name.clone()))?;
            let casted = col.cast(&DataType::Float64)?;
            let ca = casted.f64()?;

            let unscaled: Float64Chunked = ca
                .into_iter()
                .map(|opt| opt.map(|v| v * params.scale + params.center))
                .collect();
            df.with_column(unscaled.with_name(name.as_str().into()).into_series())?;
        }

        Ok(df)
    }

    /// Fit on a frame and scale it in one call
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

/// Guard against division by zero for constant columns
fn normalize(params: ScalerParams) -> ScalerParams {
    if params.scale.abs() < 1e-12 {
        ScalerParams {
            center: params.center,
            scale: 1.0,
        }
    } else {
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df!("x" => &[0.0f64, 5.0, 10.0], "y" => &[1.0f64, 2.0, 3.0]).unwrap()
    }

    #[test]
    fn test_minmax_scaling() {
        let df = sample_df();
        let mut scaler = Scaler::new(ScalerType::MinMax);
        let out = scaler.fit_transform(&df, &["x"]).unwrap();

        let x = out.column("x").unwrap().f64().unwrap();
        assert_eq!(x.get(0), Some(0.0));
        assert_eq!(x.get(1), Some(0.5));
        assert_eq!(x.get(2), Some(1.0));
    }

    #[test]
    fn test_standard_scaling() {
        let df = sample_df();
        let mut scaler = Scaler::new(ScalerType::Standard);
        let out = scaler.fit_transform(&df, &["x"]).unwrap();

        let x = out.column("x").unwrap().f64().unwrap();
        assert!((x.get(1).unwrap()).abs() < 1e-12);

        let mean: f64 = x.into_iter().flatten().sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_scale_is_one() {
        let df = df!("x" => &[4.0f64, 4.0, 4.0]).unwrap();
        let mut scaler = Scaler::new(ScalerType::MinMax);
        let out = scaler.fit_transform(&df, &["x"]).unwrap();

        let x = out.column("x").unwrap().f64().unwrap();
        for v in x.into_iter().flatten() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_params_reused_on_new_frame() {
        let train = sample_df();
        let mut scaler = Scaler::new(ScalerType::MinMax);
        scaler.fit(&train, &["x"]).unwrap();

        // A test value above the training max scales beyond 1
        let test = df!("x" => &[20.0f64]).unwrap();
        let out = scaler.transform(&test).unwrap();
        assert_eq!(out.column("x").unwrap().f64().unwrap().get(0), Some(2.0));
    }

    #[test]
    fn test_inverse_round_trip() {
        let df = sample_df();
        let mut scaler = Scaler::new(ScalerType::Standard);
        let scaled = scaler.fit_transform(&df, &["x", "y"]).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();

        let orig = df.column("x").unwrap().f64().unwrap();
        let back = restored.column("x").unwrap().f64().unwrap();
        for (a, b) in orig.into_iter().zip(back.into_iter()) {
            assert!((a.unwrap() - b.unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_none_scaler_is_identity() {
        let df = sample_df();
        let mut scaler = Scaler::new(ScalerType::None);
        let out = scaler.fit_transform(&df, &["x"]).unwrap();
        assert_eq!(
            out.column("x").unwrap().f64().unwrap().get(1),
            Some(5.0)
        );
    }
}
