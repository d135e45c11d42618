//! Model evaluation and ranking
//!
//! Collects per-model train/test metrics into a leaderboard ranked by
//! test R², and turns fitted models into feature-importance tables.

use crate::data::DataSaver;
use crate::error::{DemandError, Result};
use crate::training::engine::{ModelKind, Regressor};
use crate::training::metrics::ModelMetrics;
use crate::tuning::search_space::TrialParams;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Evaluation record for one tuned model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub name: String,
    pub kind: ModelKind,
    pub train: ModelMetrics,
    pub test: ModelMetrics,
    /// Best mean cross-validated MSE seen during tuning
    pub cv_mse: f64,
    pub best_params: TrialParams,
    pub training_time_secs: f64,
}

/// Models ranked by test R², best first; models without a finite
/// test R² sink to the bottom
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    reports: Vec<ModelReport>,
}

fn r2_rank_key(report: &ModelReport) -> f64 {
    report
        .test
        .r2
        .filter(|v| v.is_finite())
        .unwrap_or(f64::NEG_INFINITY)
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: ModelReport) {
        self.reports.push(report);
        self.reports
            .sort_by(|a, b| r2_rank_key(b).total_cmp(&r2_rank_key(a)));
    }

    pub fn best(&self) -> Option<&ModelReport> {
        self.reports.first()
    }

    pub fn reports(&self) -> &[ModelReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// One row per model, ranked order
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let names: Vec<String> = self.reports.iter().map(|r| r.name.clone()).collect();
        let train_mse: Vec<Option<f64>> = self.reports.iter().map(|r| r.train.mse).collect();
        let test_mse: Vec<Option<f64>> = self.reports.iter().map(|r| r.test.mse).collect();
        let train_rmse: Vec<Option<f64>> = self.reports.iter().map(|r| r.train.rmse).collect();
        let test_rmse: Vec<Option<f64>> = self.reports.iter().map(|r| r.test.rmse).collect();
        let train_mae: Vec<Option<f64>> = self.reports.iter().map(|r| r.train.mae).collect();
        let test_mae: Vec<Option<f64>> = self.reports.iter().map(|r| r.test.mae).collect();
        let train_r2: Vec<Option<f64>> = self.reports.iter().map(|r| r.train.r2).collect();
        let test_r2: Vec<Option<f64>> = self.reports.iter().map(|r| r.test.r2).collect();
        let cv_mse: Vec<f64> = self.reports.iter().map(|r| r.cv_mse).collect();
        let time: Vec<f64> = self
            .reports
            .iter()
            .map(|r| r.training_time_secs)
            .collect();

        let df = DataFrame::new(vec![
            Series::new("model".into(), names).into_column(),
            Series::new("train_mse".into(), train_mse).into_column(),
            Series::new("test_mse".into(), test_mse).into_column(),
            Series::new("train_rmse".into(), train_rmse).into_column(),
            Series::new("test_rmse".into(), test_rmse).into_column(),
            Series::new("train_mae".into(), train_mae).into_column(),
            Series::new("test_mae".into(), test_mae).into_column(),
            Series::new("train_r2".into(), train_r2).into_column(),
            Series::new("test_r2".into(), test_r2).into_column(),
            Series::new("cv_mse".into(), cv_mse).into_column(),
            Series::new("training_time_secs".into(), time).into_column(),
        ])?;
        Ok(df)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let df = self.to_dataframe()?;
        DataSaver::save_csv(&df, path)
    }
}

/// Feature importances of a fitted model, sorted descending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportanceReport {
    entries: Vec<(String, f64)>,
}

impl FeatureImportanceReport {
    pub fn from_model(model: &Regressor, feature_names: &[String]) -> Result<Self> {
        let importances = model.feature_importances().ok_or_else(|| {
            DemandError::TrainingError(format!(
                "{} reports no feature importances",
                model.name()
            ))
        })?;

        if importances.len() != feature_names.len() {
            return Err(DemandError::ShapeError {
                expected: format!("{} importances", feature_names.len()),
                actual: format!("{}", importances.len()),
            });
        }

        let mut entries: Vec<(String, f64)> = feature_names
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn top(&self, k: usize) -> &[(String, f64)] {
        &self.entries[..k.min(self.entries.len())]
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let features: Vec<String> = self.entries.iter().map(|(n, _)| n.clone()).collect();
        let importances: Vec<f64> = self.entries.iter().map(|(_, v)| *v).collect();

        let df = DataFrame::new(vec![
            Series::new("feature".into(), features).into_column(),
            Series::new("importance".into(), importances).into_column(),
        ])?;
        Ok(df)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let df = self.to_dataframe()?;
        DataSaver::save_csv(&df, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataLoader;
    use ndarray::{Array1, Array2};

    fn report(name: &str, test_r2: Option<f64>) -> ModelReport {
        ModelReport {
            name: name.to_string(),
            kind: ModelKind::Linear,
            train: ModelMetrics::default(),
            test: ModelMetrics {
                r2: test_r2,
                ..Default::default()
            },
            cv_mse: 1.0,
            best_params: TrialParams::new(),
            training_time_secs: 0.1,
        }
    }

    #[test]
    fn test_leaderboard_ranks_by_test_r2() {
        let mut board = Leaderboard::new();
        board.push(report("mid", Some(0.5)));
        board.push(report("best", Some(0.9)));
        board.push(report("worst", Some(0.1)));

        let names: Vec<&str> = board.reports().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["best", "mid", "worst"]);
        assert_eq!(board.best().unwrap().name, "best");
    }

    #[test]
    fn test_nan_and_missing_r2_rank_last() {
        let mut board = Leaderboard::new();
        board.push(report("nan", Some(f64::NAN)));
        board.push(report("ok", Some(0.3)));
        board.push(report("none", None));

        assert_eq!(board.best().unwrap().name, "ok");
        let tail: Vec<&str> = board.reports()[1..]
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert!(tail.contains(&"nan"));
        assert!(tail.contains(&"none"));
    }

    #[test]
    fn test_to_dataframe_shape() {
        let mut board = Leaderboard::new();
        board.push(report("a", Some(0.8)));
        board.push(report("b", Some(0.6)));

        let df = board.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert!(df.column("model").is_ok());
        assert!(df.column("test_r2").is_ok());
        assert!(df.column("cv_mse").is_ok());
    }

    #[test]
    fn test_importance_report_sorted() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                0.5
            }
        });
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 1.0 } else { 9.0 });

        let mut model = Regressor::default_for(ModelKind::DecisionTree);
        model.fit(&x, &y).unwrap();

        let names = vec!["signal".to_string(), "noise".to_string()];
        let report = FeatureImportanceReport::from_model(&model, &names).unwrap();

        assert_eq!(report.entries().len(), 2);
        assert_eq!(report.entries()[0].0, "signal");
        assert!(report.entries()[0].1 >= report.entries()[1].1);
        assert_eq!(report.top(1).len(), 1);
    }

    #[test]
    fn test_importance_name_count_mismatch_errors() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i + j) as f64);
        let y = Array1::from_shape_fn(10, |i| i as f64);

        let mut model = Regressor::default_for(ModelKind::Linear);
        model.fit(&x, &y).unwrap();

        let names = vec!["only_one".to_string()];
        assert!(FeatureImportanceReport::from_model(&model, &names).is_err());
    }

    #[test]
    fn test_write_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_comparison.csv");

        let mut board = Leaderboard::new();
        board.push(report("a", Some(0.8)));
        board.write_csv(&path).unwrap();

        let df = DataLoader::new().load(&path).unwrap();
        assert_eq!(df.height(), 1);
        assert!(df.column("test_r2").is_ok());
    }
}
