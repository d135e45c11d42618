//! Demandcast - Retail demand analytics and forecasting
//!
//! This crate implements a batch pipeline that turns raw retail
//! transaction exports into trained demand forecasting models:
//! - Structural cleaning and feature derivation
//! - Train-fitted preprocessing (imputation, outlier clipping, encoding,
//!   correlation pruning, scaling)
//! - Model training with hyperparameter search over several regressors
//! - Evaluation, model comparison reports, and artifact persistence
//!
//! # Modules
//!
//! - [`data`] - Dataset loading, inspection, and train/test splitting
//! - [`preprocessing`] - Cleaning and the fitted feature pipeline
//! - [`training`] - Regression models and cross validation
//! - [`tuning`] - Random hyperparameter search
//! - [`evaluation`] - Metrics reports and the model leaderboard
//! - [`artifact`] - Persisted model bundles for later prediction
//! - [`pipeline`] - End-to-end forecast pipeline orchestration
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod preprocessing;
pub mod training;
pub mod tuning;

pub mod evaluation;
pub mod artifact;
pub mod pipeline;

pub mod cli;

pub use error::{DemandError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{DemandError, Result};

    pub use crate::data::{DataLoader, DataSaver, FileInfo, SplitConfig};
    pub use crate::preprocessing::{
        CleanConfig, FeaturePipeline, PreprocessingConfig, ScalerType, TableCleaner,
    };
    pub use crate::training::{ModelKind, ModelMetrics, Regressor};
    pub use crate::tuning::{RandomSearchTuner, SearchSpace, TunerConfig};
    pub use crate::evaluation::{Leaderboard, ModelReport};
    pub use crate::artifact::ModelArtifact;
    pub use crate::pipeline::{ForecastPipeline, PipelineConfig, RunSummary};
}
