//! Demandcast CLI Module
//!
//! Command-line interface for pipeline runs, single-model training,
//! batch scoring, and data inspection.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use crate::artifact::ModelArtifact;
use crate::data::{train_test_split, DataLoader, DataSaver, SplitConfig};
use crate::evaluation::FeatureImportanceReport;
use crate::pipeline::{ForecastPipeline, PipelineConfig};
use crate::preprocessing::{summarize, FeaturePipeline, ImputeStrategy, ScalerType, TableCleaner};
use crate::training::{design_matrix, feature_columns, target_vector, ModelKind, ModelMetrics};
use crate::tuning::{RandomSearchTuner, TunerConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".into())
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "demandcast")]
#[command(author = "Demandcast Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Retail demand analytics and forecasting pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline: clean, split, tune, evaluate, persist
    Run {
        /// Input transaction export (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = "actual_demand")]
        target: String,

        /// Output directory for reports and the model artifact
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Held-out fraction for the test split
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Seed for the split, samplers, and model fitting
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Hyperparameter configurations sampled per model family
        #[arg(long, default_value = "10")]
        trials: usize,

        /// Number of cross-validation folds
        #[arg(long, default_value = "3")]
        cv_folds: usize,

        /// Comma-separated families (linear, decision_tree, random_forest,
        /// gradient_boosting, xgboost); all five when omitted
        #[arg(short, long)]
        models: Option<String>,
    },

    /// Tune and evaluate a single model family
    Train {
        /// Input transaction export (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = "actual_demand")]
        target: String,

        /// Model family (linear, decision_tree, random_forest,
        /// gradient_boosting, xgboost)
        #[arg(short, long, default_value = "xgboost")]
        model: String,

        /// Hyperparameter configurations to sample
        #[arg(long, default_value = "10")]
        trials: usize,

        /// Number of cross-validation folds
        #[arg(long, default_value = "3")]
        cv_folds: usize,

        /// Held-out fraction for the test split
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Seed for the split, sampler, and model fitting
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Where to save the trained model artifact
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score a raw export with a saved model artifact
    Predict {
        /// Trained model artifact (model.json)
        #[arg(short, long)]
        model: PathBuf,

        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Clean and encode a table without training anything
    Preprocess {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = "actual_demand")]
        target: String,

        /// Scaler type (none, standard, minmax, robust)
        #[arg(long, default_value = "minmax")]
        scaler: String,

        /// Numeric imputation strategy (mean, median, mode)
        #[arg(long, default_value = "mean")]
        imputation: String,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

fn parse_models(spec: &str) -> anyhow::Result<Vec<ModelKind>> {
    let mut kinds = Vec::new();
    for name in spec.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        kinds.push(ModelKind::from_str(name)?);
    }
    if kinds.is_empty() {
        anyhow::bail!("no model families given");
    }
    Ok(kinds)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    data_path: &PathBuf,
    target: &str,
    output_dir: &PathBuf,
    test_fraction: f64,
    seed: u64,
    trials: usize,
    cv_folds: usize,
    models: Option<&str>,
) -> anyhow::Result<()> {
    section("Forecast Run");

    let kinds = match models {
        Some(spec) => parse_models(spec)?,
        None => ModelKind::all().to_vec(),
    };
    let roster: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();

    println!("  {:<12} {}", muted("Data"), data_path.display());
    println!("  {:<12} {}", muted("Target"), target);
    println!("  {:<12} {}", muted("Output"), output_dir.display());
    println!("  {:<12} {}", muted("Models"), roster.join(", "));
    println!();

    let config = PipelineConfig::new(data_path)
        .with_target_column(target)
        .with_output_dir(output_dir)
        .with_split(SplitConfig::new(test_fraction, seed))
        .with_tuner(TunerConfig {
            n_iter: trials,
            cv_folds,
            seed,
        })
        .with_models(kinds);

    step_run("Running pipeline");
    let summary = ForecastPipeline::new(config).run()?;
    step_done(&format!("{:.2}s", summary.elapsed_secs));

    section("Data");
    println!("  {:<16} {}", muted("Raw rows"), summary.n_rows_raw);
    println!("  {:<16} {}", muted("Clean rows"), summary.n_rows_clean);
    println!("  {:<16} {} / {}", muted("Train / test"), summary.n_train, summary.n_test);
    println!("  {:<16} {}", muted("Features"), summary.n_features);
    if !summary.pruned_features.is_empty() {
        println!(
            "  {:<16} {}",
            muted("Pruned"),
            dim(&summary.pruned_features.join(", "))
        );
    }

    section("Leaderboard");
    println!(
        "  {:<22} {:>8} {:>10} {:>10} {:>12} {:>8}",
        muted("Model"),
        muted("R²"),
        muted("RMSE"),
        muted("MAE"),
        muted("CV MSE"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(74)));
    for report in summary.leaderboard.reports() {
        println!(
            "  {:<22} {:>8.4} {:>10.3} {:>10.3} {:>12.3} {:>7.2}s",
            report.name,
            report.test.r2.unwrap_or(f64::NAN),
            report.test.rmse.unwrap_or(f64::NAN),
            report.test.mae.unwrap_or(f64::NAN),
            report.cv_mse,
            report.training_time_secs,
        );
    }
    println!("  {}", dim(&"─".repeat(74)));

    if let Some(best) = summary.leaderboard.best() {
        println!();
        println!(
            "  {} {} {} {:.4}",
            ok("best"),
            best.name.white().bold(),
            muted("R²:"),
            best.test.r2.unwrap_or(f64::NAN)
        );
    }

    let artifact = ModelArtifact::load(&summary.artifact_path)?;
    let importance = FeatureImportanceReport::from_model(&artifact.model, &artifact.feature_names)?;

    section("Feature Importance");
    for (feature, value) in importance.top(8) {
        let width = (value * 30.0).round() as usize;
        println!(
            "  {:<26} {} {:.3}",
            feature,
            accent(&"▇".repeat(width.max(1))),
            value
        );
    }

    section("Outputs");
    for file in &summary.output_files {
        step_ok(&file.display().to_string());
    }

    println!();
    Ok(())
}

pub fn cmd_train(
    data_path: &PathBuf,
    target: &str,
    model: &str,
    trials: usize,
    cv_folds: usize,
    test_fraction: f64,
    seed: u64,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    section("Train");

    let kind = ModelKind::from_str(model)?;

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load(data_path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        df.height(),
        df.width(),
        start.elapsed()
    ));

    let base = PipelineConfig::new(data_path).with_target_column(target);

    step_run("Preparing features");
    let start = Instant::now();
    let cleaner = TableCleaner::new(base.clean.clone());
    let cleaned = cleaner.clean(&df)?;
    let (train_raw, test_raw) = train_test_split(&cleaned, &SplitConfig::new(test_fraction, seed))?;
    let mut pipeline = FeaturePipeline::new(target, base.preprocessing.clone());
    let train = pipeline.fit_transform(&train_raw)?;
    let test = pipeline.transform(&test_raw)?;
    step_done(&format!(
        "{} train / {} test rows, {} cols in {:?}",
        train.height(),
        test.height(),
        train.width(),
        start.elapsed()
    ));

    let features = feature_columns(&train, target);
    let x_train = design_matrix(&train, &features)?;
    let y_train = target_vector(&train, target)?;
    let x_test = design_matrix(&test, &features)?;
    let y_test = target_vector(&test, target)?;

    step_run(&format!(
        "Tuning {} over {} trials",
        kind.display_name().cyan(),
        trials
    ));
    let start = Instant::now();
    let tuner = RandomSearchTuner::new(TunerConfig {
        n_iter: trials,
        cv_folds,
        seed,
    });
    let outcome = tuner.tune(kind, &x_train, &y_train)?;
    let elapsed = start.elapsed();
    step_done(&format!("{:?}", elapsed));

    let train_preds = outcome.best_model.predict(&x_train)?;
    let test_preds = outcome.best_model.predict(&x_test)?;
    let train_metrics = ModelMetrics::compute_regression(&y_train, &train_preds)?;
    let test_metrics = ModelMetrics::compute_regression(&y_test, &test_preds)?;

    println!();
    println!(
        "  {:<16} {}",
        muted("Test R²"),
        format!("{:.4}", test_metrics.r2.unwrap_or(f64::NAN)).white().bold()
    );
    println!(
        "  {:<16} {}",
        muted("Test RMSE"),
        format!("{:.3}", test_metrics.rmse.unwrap_or(f64::NAN)).white()
    );
    println!(
        "  {:<16} {}",
        muted("Train R²"),
        format!("{:.4}", train_metrics.r2.unwrap_or(f64::NAN)).white()
    );
    println!(
        "  {:<16} {}",
        muted("CV MSE"),
        format!("{:.3}", outcome.best_mse).white()
    );
    println!(
        "  {:<16} {}",
        muted("Time"),
        format!("{:.3}s", elapsed.as_secs_f64()).white()
    );

    if let Some(path) = output {
        let artifact = ModelArtifact::new(
            outcome.best_model,
            cleaner,
            pipeline,
            features,
            target,
            test_metrics,
        );
        println!();
        step_run(&format!("Saving → {}", path.display()));
        artifact.save(path)?;
        step_done("");
    }

    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &PathBuf,
    data_path: &PathBuf,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let artifact = ModelArtifact::load(model_path)?;
    step_done(&format!("{} ({})", artifact.model_name, artifact.created_at));

    println!();
    println!("  {:<12} {}", muted("Model"), artifact.model_name.white());
    println!("  {:<12} {}", muted("Target"), artifact.target_column);
    println!("  {:<12} {}", muted("Features"), artifact.feature_names.len());
    println!(
        "  {:<12} {}",
        muted("Test R²"),
        fmt_opt(artifact.metrics.r2)
    );
    println!();

    step_run("Loading data");
    let df = DataLoader::new().load(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run("Scoring");
    let start = Instant::now();
    let preds = artifact.predict_frame(&df)?;
    step_done(&format!("{} predictions in {:?}", preds.len(), start.elapsed()));

    let out_path = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("predictions.csv"));
    let pred_column = format!("predicted_{}", artifact.target_column);

    let mut scored = df;
    scored.with_column(Series::new(pred_column.as_str().into(), preds.to_vec()))?;

    step_run(&format!("Saving → {}", out_path.display()));
    DataSaver::save_csv(&scored, &out_path)?;
    step_done(&format!("{} rows", scored.height()));

    println!();
    Ok(())
}

pub fn cmd_preprocess(
    data_path: &PathBuf,
    output_path: &PathBuf,
    target: &str,
    scaler: &str,
    imputation: &str,
) -> anyhow::Result<()> {
    section("Preprocess");

    let scaler_type = match scaler {
        "none" => ScalerType::None,
        "standard" => ScalerType::Standard,
        "minmax" => ScalerType::MinMax,
        "robust" => ScalerType::Robust,
        _ => anyhow::bail!("Invalid scaler type: {}", scaler),
    };

    let impute_strategy = match imputation {
        "mean" => ImputeStrategy::Mean,
        "median" => ImputeStrategy::Median,
        "mode" => ImputeStrategy::MostFrequent,
        _ => anyhow::bail!("Invalid imputation strategy: {}", imputation),
    };

    step_run("Loading data");
    let df = DataLoader::new().load(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let base = PipelineConfig::new(data_path).with_target_column(target);
    let config = base
        .preprocessing
        .clone()
        .with_scaler(scaler_type)
        .with_numeric_impute(impute_strategy);

    step_run("Cleaning");
    let cleaner = TableCleaner::new(base.clean.clone());
    let cleaned = cleaner.clean(&df)?;
    step_done(&format!("{} rows", cleaned.height()));

    step_run("Encoding");
    let start = Instant::now();
    let mut pipeline = FeaturePipeline::new(target, config);
    let processed = pipeline.fit_transform(&cleaned)?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run(&format!("Saving → {}", output_path.display()));
    DataSaver::save_csv(&processed, output_path)?;
    step_done(&format!(
        "{} rows × {} cols",
        processed.height(),
        processed.width()
    ));

    if !pipeline.pruned_features().is_empty() {
        println!();
        println!(
            "  {:<12} {}",
            muted("Pruned"),
            dim(&pipeline.pruned_features().join(", "))
        );
    }

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &PathBuf) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!(
        "  {:<12} {:.2} MB",
        muted("Memory"),
        df.estimated_size() as f64 / 1024.0 / 1024.0
    );
    println!();

    println!(
        "  {:<24} {:<12} {:>6} {:>10} {:>8}",
        muted("Column"),
        muted("Type"),
        muted("Nulls"),
        muted("Mean"),
        muted("Unique")
    );
    println!("  {}", dim(&"─".repeat(66)));

    for stats in summarize(&df)? {
        let unique = stats
            .unique_count
            .map(|u| u.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<24} {:<12} {:>6} {:>10} {:>8}",
            stats.name,
            stats.dtype.truecolor(140, 140, 140),
            stats.null_count,
            fmt_opt(stats.mean),
            unique
        );
    }

    println!();
    Ok(())
}

// ─── Banner and help ───────────────────────────────────────────────────────────

pub fn print_banner() {
    println!();
    println!();
    println!("       {}", "╺┳┓┏━╸┏┳┓┏━┓┏┓╻╺┳┓┏━╸┏━┓┏━┓╺┳╸".truecolor(120, 170, 255));
    println!("       {}", " ┃┃┣━╸┃┃┃┣━┫┃┗┫ ┃┃┃  ┣━┫┗━┓ ┃ ".truecolor(100, 150, 240));
    println!("       {}", "╺┻┛┗━╸╹ ╹╹ ╹╹ ╹╺┻┛┗━╸╹ ╹┗━┛ ╹ ".truecolor(80, 130, 220));
    println!();
    println!(
        "       {}",
        dim(&format!(
            "Retail Demand Forecasting  ·  v{}  ·  rust",
            env!("CARGO_PKG_VERSION")
        ))
    );
    println!();
}

pub fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("demandcast run -d data.csv", "Run the full forecasting pipeline"),
        ("demandcast run -d data.csv -m linear,xgboost", "Restrict the model roster"),
        ("demandcast train -d data.csv -m xgboost", "Tune a single model family"),
        ("demandcast predict -m output/model.json -d new.csv", "Score a raw export"),
        ("demandcast preprocess -d in.csv -o out.csv", "Clean and encode a table"),
        ("demandcast info -d data.csv", "Inspect a dataset"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<52} {}", cmd.white(), muted(desc));
    }

    section("Run outputs");

    let outputs: &[(&str, &str)] = &[
        ("preprocessed_data.csv", "Cleaned table before the split"),
        ("train_data.csv / test_data.csv", "Encoded splits with identical schemas"),
        ("model_comparison.csv", "Leaderboard across model families"),
        ("feature_importance.csv", "Importances of the winning model"),
        ("model.json", "Reloadable model artifact"),
    ];

    for (file, desc) in outputs {
        println!("  {:<36} {}", file.truecolor(120, 170, 255), muted(desc));
    }

    println!();
}
