//! Model dispatch and frame-to-matrix conversion
//!
//! `Regressor` wraps every supported model behind one fit/predict
//! surface so the tuner and pipeline can treat them uniformly.

use crate::error::{DemandError, Result};
use crate::training::decision_tree::DecisionTree;
use crate::training::gradient_boosting::GradientBoosting;
use crate::training::linear::LinearRegression;
use crate::training::random_forest::RandomForest;
use crate::training::xgb::{XgbConfig, XgbRegressor};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The supported model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Linear,
    DecisionTree,
    RandomForest,
    GradientBoosting,
    Xgb,
}

impl ModelKind {
    pub fn all() -> [ModelKind; 5] {
        [
            ModelKind::Linear,
            ModelKind::DecisionTree,
            ModelKind::RandomForest,
            ModelKind::GradientBoosting,
            ModelKind::Xgb,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::Xgb => "xgboost",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Linear => "Linear Regression",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::Xgb => "XGBoost",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = DemandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" | "linear_regression" => Ok(ModelKind::Linear),
            "decision_tree" | "tree" => Ok(ModelKind::DecisionTree),
            "random_forest" | "forest" => Ok(ModelKind::RandomForest),
            "gradient_boosting" | "gbm" => Ok(ModelKind::GradientBoosting),
            "xgboost" | "xgb" => Ok(ModelKind::Xgb),
            other => Err(DemandError::InvalidParameter {
                name: "model".to_string(),
                value: other.to_string(),
                reason: "unknown model kind".to_string(),
            }),
        }
    }
}

/// A model of any supported family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Regressor {
    Linear(LinearRegression),
    Tree(DecisionTree),
    Forest(RandomForest),
    Gbm(GradientBoosting),
    Xgb(XgbRegressor),
}

impl Regressor {
    /// A sensibly-seeded default model of the given family
    pub fn default_for(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Linear => Regressor::Linear(LinearRegression::new()),
            ModelKind::DecisionTree => {
                Regressor::Tree(DecisionTree::new_regressor().with_max_depth(10))
            }
            ModelKind::RandomForest => Regressor::Forest(
                RandomForest::new_regressor()
                    .with_n_estimators(100)
                    .with_random_state(42),
            ),
            ModelKind::GradientBoosting => Regressor::Gbm(
                GradientBoosting::new_regressor()
                    .with_n_estimators(100)
                    .with_random_state(42),
            ),
            ModelKind::Xgb => Regressor::Xgb(XgbRegressor::new(XgbConfig::default())),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Regressor::Linear(_) => ModelKind::Linear,
            Regressor::Tree(_) => ModelKind::DecisionTree,
            Regressor::Forest(_) => ModelKind::RandomForest,
            Regressor::Gbm(_) => ModelKind::GradientBoosting,
            Regressor::Xgb(_) => ModelKind::Xgb,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Regressor::Linear(m) => m.fit(x, y).map(|_| ()),
            Regressor::Tree(m) => m.fit(x, y).map(|_| ()),
            Regressor::Forest(m) => m.fit(x, y).map(|_| ()),
            Regressor::Gbm(m) => m.fit(x, y).map(|_| ()),
            Regressor::Xgb(m) => m.fit(x, y).map(|_| ()),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Regressor::Linear(m) => m.predict(x),
            Regressor::Tree(m) => m.predict(x),
            Regressor::Forest(m) => m.predict(x),
            Regressor::Gbm(m) => m.predict(x),
            Regressor::Xgb(m) => m.predict(x),
        }
    }

    pub fn is_fitted(&self) -> bool {
        match self {
            Regressor::Linear(m) => m.is_fitted(),
            Regressor::Tree(m) => m.is_fitted(),
            Regressor::Forest(m) => m.is_fitted(),
            Regressor::Gbm(m) => m.is_fitted(),
            Regressor::Xgb(m) => m.is_fitted(),
        }
    }

    /// Importances where the family defines them; the linear model
    /// reports normalized absolute coefficients.
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            Regressor::Linear(m) => m.coefficient_magnitudes(),
            Regressor::Tree(m) => m.feature_importances().cloned(),
            Regressor::Forest(m) => m.feature_importances().cloned(),
            Regressor::Gbm(m) => m.feature_importances().cloned(),
            Regressor::Xgb(m) => m.feature_importances(),
        }
    }
}

/// Feature column names, frame order, target excluded
pub fn feature_columns(df: &DataFrame, target: &str) -> Vec<String> {
    df.get_column_names()
        .iter()
        .filter(|c| c.as_str() != target)
        .map(|c| c.as_str().to_string())
        .collect()
}

/// Build the design matrix from named columns, cast to f64
pub fn design_matrix(df: &DataFrame, features: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut cols: Vec<Vec<f64>> = Vec::with_capacity(features.len());

    for name in features {
        let casted = df.column(name.as_str())?.cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        cols.push(ca.into_iter().map(|v| v.unwrap_or(0.0)).collect());
    }

    Ok(Array2::from_shape_fn((n_rows, features.len()), |(r, c)| {
        cols[c][r]
    }))
}

/// Extract the target column as a dense f64 vector
pub fn target_vector(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let casted = df.column(target)?.cast(&DataType::Float64)?;
    let values: Vec<f64> = casted
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();
    Ok(Array1::from_vec(values))
}
