//! End-to-end forecasting pipeline
//!
//! One `run()` drives the whole sequence: load, clean, split, fit the
//! feature pipeline on the training split, tune every model family,
//! rank them on the held-out split, and persist the reports plus the
//! winning model as a reloadable artifact.
//!
//! Statistics are only ever fitted on the training split. The cleaner
//! runs before the split because its transforms are row-local.

use crate::artifact::ModelArtifact;
use crate::data::{train_test_split, DataLoader, DataSaver, SplitConfig};
use crate::error::{DemandError, Result};
use crate::evaluation::{FeatureImportanceReport, Leaderboard, ModelReport};
use crate::preprocessing::{CleanConfig, FeaturePipeline, PreprocessingConfig, TableCleaner};
use crate::training::engine::{design_matrix, feature_columns, target_vector, ModelKind, Regressor};
use crate::training::metrics::ModelMetrics;
use crate::tuning::{RandomSearchTuner, TunerConfig};
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

pub const PREPROCESSED_FILE: &str = "preprocessed_data.csv";
pub const TRAIN_FILE: &str = "train_data.csv";
pub const TEST_FILE: &str = "test_data.csv";
pub const COMPARISON_FILE: &str = "model_comparison.csv";
pub const IMPORTANCE_FILE: &str = "feature_importance.csv";
pub const MODEL_FILE: &str = "model.json";

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub target_column: String,
    pub clean: CleanConfig,
    pub preprocessing: PreprocessingConfig,
    pub split: SplitConfig,
    pub tuner: TunerConfig,
    pub models: Vec<ModelKind>,
}

impl PipelineConfig {
    /// Defaults for the retail transaction schema: identifier and date
    /// columns by their conventional names, log-scaled unit price,
    /// quartile-banded income and the Bronze..Platinum loyalty ladder.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        let clean = CleanConfig::new("actual_demand")
            .with_id_columns(vec![
                "transaction_id",
                "customer_id",
                "product_id",
                "store_id",
                "supplier_id",
            ])
            .with_date_columns(vec!["transaction_date"])
            .with_log_columns(vec!["unit_price"]);

        let preprocessing = PreprocessingConfig::default()
            .with_band_column("customer_income")
            .with_ordinal_order(
                "customer_loyalty_level",
                vec!["Bronze", "Silver", "Gold", "Platinum"],
            );

        Self {
            input_path: input_path.into(),
            output_dir: PathBuf::from("output"),
            target_column: "actual_demand".to_string(),
            clean,
            preprocessing,
            split: SplitConfig::default(),
            tuner: TunerConfig::default(),
            models: ModelKind::all().to_vec(),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_target_column(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.clean.target_column = target.clone();
        self.target_column = target;
        self
    }

    pub fn with_clean(mut self, clean: CleanConfig) -> Self {
        self.target_column = clean.target_column.clone();
        self.clean = clean;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_tuner(mut self, tuner: TunerConfig) -> Self {
        self.tuner = tuner;
        self
    }

    pub fn with_models(mut self, models: Vec<ModelKind>) -> Self {
        self.models = models;
        self
    }

    pub fn output_path(&self, file: &str) -> PathBuf {
        self.output_dir.join(file)
    }
}

/// What a pipeline run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub n_rows_raw: usize,
    pub n_rows_clean: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub pruned_features: Vec<String>,
    pub leaderboard: Leaderboard,
    pub best_model_name: String,
    pub artifact_path: PathBuf,
    pub output_files: Vec<PathBuf>,
    pub elapsed_secs: f64,
}

/// The six-stage batch pipeline
pub struct ForecastPipeline {
    config: PipelineConfig,
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let cfg = &self.config;

        if cfg.models.is_empty() {
            return Err(DemandError::ConfigError(
                "no models configured".to_string(),
            ));
        }

        // Stage 1: load
        let raw = DataLoader::new().load(&cfg.input_path)?;
        let n_rows_raw = raw.height();

        // Stage 2, structural pass: dedupe and row-local column transforms
        let cleaner = TableCleaner::new(cfg.clean.clone());
        let cleaned = cleaner.clean(&raw)?;
        let n_rows_clean = cleaned.height();
        let preprocessed_path = cfg.output_path(PREPROCESSED_FILE);
        DataSaver::save_csv(&cleaned, &preprocessed_path)?;
        info!(
            rows = n_rows_clean,
            cols = cleaned.width(),
            "cleaned table written"
        );

        // Stage 3: split before any statistic is fitted
        let (train_raw, test_raw) = train_test_split(&cleaned, &cfg.split)?;

        // Stage 2, fitted pass: impute, band, clip, encode, prune, scale
        let mut pipeline = FeaturePipeline::new(&cfg.target_column, cfg.preprocessing.clone());
        let train = pipeline.fit_transform(&train_raw)?;
        let test = pipeline.transform(&test_raw)?;
        verify_schemas_match(&train, &test)?;

        let train_path = cfg.output_path(TRAIN_FILE);
        let test_path = cfg.output_path(TEST_FILE);
        DataSaver::save_csv(&train, &train_path)?;
        DataSaver::save_csv(&test, &test_path)?;

        let features = feature_columns(&train, &cfg.target_column);
        let x_train = design_matrix(&train, &features)?;
        let y_train = target_vector(&train, &cfg.target_column)?;
        let x_test = design_matrix(&test, &features)?;
        let y_test = target_vector(&test, &cfg.target_column)?;
        info!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = features.len(),
            "matrices ready"
        );

        // Stage 4: tune and refit every family
        let tuner = RandomSearchTuner::new(cfg.tuner.clone());
        let mut board = Leaderboard::new();
        let mut models: HashMap<ModelKind, Regressor> = HashMap::new();

        for kind in &cfg.models {
            let fit_started = Instant::now();
            let outcome = tuner.tune(*kind, &x_train, &y_train)?;
            let elapsed = fit_started.elapsed().as_secs_f64();

            let train_preds = outcome.best_model.predict(&x_train)?;
            let test_preds = outcome.best_model.predict(&x_test)?;
            let train_metrics = ModelMetrics::compute_regression(&y_train, &train_preds)?
                .with_training_time(elapsed)
                .with_n_features(features.len());
            let test_metrics = ModelMetrics::compute_regression(&y_test, &test_preds)?;

            info!(
                model = kind.as_str(),
                test_r2 = test_metrics.r2,
                secs = elapsed,
                "family tuned"
            );

            board.push(ModelReport {
                name: kind.display_name().to_string(),
                kind: *kind,
                train: train_metrics,
                test: test_metrics,
                cv_mse: outcome.best_mse,
                best_params: outcome.best_params,
                training_time_secs: elapsed,
            });
            models.insert(*kind, outcome.best_model);
        }

        // Stage 5: persist the comparison and the winner's importances
        let comparison_path = cfg.output_path(COMPARISON_FILE);
        board.write_csv(&comparison_path)?;

        let (best_kind, best_name, best_test_metrics) = {
            let best = board
                .best()
                .ok_or_else(|| DemandError::TrainingError("no models trained".to_string()))?;
            (best.kind, best.name.clone(), best.test.clone())
        };
        let best_model = models.remove(&best_kind).ok_or_else(|| {
            DemandError::TrainingError(format!("missing fitted model for {}", best_kind))
        })?;

        let importance = FeatureImportanceReport::from_model(&best_model, &features)?;
        let importance_path = cfg.output_path(IMPORTANCE_FILE);
        importance.write_csv(&importance_path)?;

        // Stage 6: bundle the winner with its preprocessing state
        let artifact = ModelArtifact::new(
            best_model,
            cleaner,
            pipeline,
            features.clone(),
            &cfg.target_column,
            best_test_metrics,
        );
        let artifact_path = cfg.output_path(MODEL_FILE);
        artifact.save(&artifact_path)?;

        let pruned_features = artifact.pipeline.pruned_features().to_vec();
        let elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            best = %best_name,
            secs = elapsed_secs,
            "pipeline run complete"
        );

        Ok(RunSummary {
            n_rows_raw,
            n_rows_clean,
            n_train: x_train.nrows(),
            n_test: x_test.nrows(),
            n_features: features.len(),
            pruned_features,
            leaderboard: board,
            best_model_name: best_name,
            artifact_path: artifact_path.clone(),
            output_files: vec![
                preprocessed_path,
                train_path,
                test_path,
                comparison_path,
                importance_path,
                artifact_path,
            ],
            elapsed_secs,
        })
    }
}

fn verify_schemas_match(train: &DataFrame, test: &DataFrame) -> Result<()> {
    let train_cols = train.get_column_names();
    let test_cols = test.get_column_names();
    if train_cols != test_cols {
        return Err(DemandError::PreprocessingError(format!(
            "train and test schemas diverge: {} vs {} columns",
            train_cols.len(),
            test_cols.len()
        )));
    }
    Ok(())
}

/// Write a small demand export for tests and demos
#[doc(hidden)]
pub fn write_sample_csv(path: &Path, n_rows: usize) -> Result<()> {
    use std::fmt::Write as _;

    let locations = ["North", "South", "East", "West"];
    let categories = ["Beverages", "Snacks", "Dairy", "Produce"];
    let loyalty = ["Bronze", "Silver", "Gold", "Platinum"];

    let mut out = String::new();
    out.push_str(
        "transaction_id,transaction_date,store_location,product_category,\
         unit_price,customer_income,customer_loyalty_level,promotion_applied,\
         stock_level,actual_demand\n",
    );

    for i in 0..n_rows {
        let price = 4.0 + (i % 9) as f64 * 1.5;
        let income = 25_000.0 + (i % 20) as f64 * 4_000.0;
        let stock = 40.0 + (i % 13) as f64 * 10.0;
        let promo = i % 3 == 0;
        let demand =
            0.8 * stock - 2.5 * price + if promo { 15.0 } else { 0.0 } + (i % 5) as f64;

        let _ = writeln!(
            out,
            "{},2023-{:02}-{:02},{},{},{:.2},{:.0},{},{},{:.0},{:.2}",
            1000 + i,
            1 + i % 12,
            1 + i % 28,
            locations[i % locations.len()],
            categories[i % categories.len()],
            price,
            income,
            loyalty[i % loyalty.len()],
            promo,
            stock,
            demand
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(dir: &Path) -> PipelineConfig {
        let input = dir.join("retail.csv");
        write_sample_csv(&input, 80).unwrap();

        PipelineConfig::new(&input)
            .with_output_dir(dir.join("out"))
            .with_models(vec![ModelKind::Linear, ModelKind::DecisionTree])
            .with_tuner(TunerConfig {
                n_iter: 2,
                cv_folds: 2,
                seed: 42,
            })
    }

    #[test]
    fn test_run_produces_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        let summary = ForecastPipeline::new(config).run().unwrap();

        assert_eq!(summary.leaderboard.len(), 2);
        assert!(!summary.best_model_name.is_empty());
        assert!(summary.n_train > summary.n_test);
        assert_eq!(summary.n_train + summary.n_test, summary.n_rows_clean);
        for file in &summary.output_files {
            assert!(file.exists(), "missing output {}", file.display());
        }
    }

    #[test]
    fn test_train_and_test_share_schema() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        let out_dir = config.output_dir.clone();
        ForecastPipeline::new(config).run().unwrap();

        let loader = DataLoader::new();
        let train = loader.load(out_dir.join(TRAIN_FILE)).unwrap();
        let test = loader.load(out_dir.join(TEST_FILE)).unwrap();
        assert_eq!(train.get_column_names(), test.get_column_names());
    }

    #[test]
    fn test_artifact_reload_scores_raw_frame() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        let input = config.input_path.clone();
        let summary = ForecastPipeline::new(config).run().unwrap();

        let artifact = ModelArtifact::load(&summary.artifact_path).unwrap();
        let raw = DataLoader::new().load(&input).unwrap();
        let preds = artifact.predict_frame(&raw).unwrap();
        assert_eq!(preds.len(), raw.height());
    }

    #[test]
    fn test_empty_model_list_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path()).with_models(Vec::new());
        assert!(ForecastPipeline::new(config).run().is_err());
    }
}
