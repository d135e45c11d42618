//! Persisted model artifact
//!
//! Bundles the fitted model with the cleaner and feature pipeline that
//! produced its training matrix, so a loaded artifact can score raw
//! frames exactly as the run that created it would have.

use crate::error::{DemandError, Result};
use crate::preprocessing::{FeaturePipeline, TableCleaner};
use crate::training::engine::{design_matrix, Regressor};
use crate::training::metrics::ModelMetrics;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Everything needed to reload and apply a trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: Regressor,
    pub cleaner: TableCleaner,
    pub pipeline: FeaturePipeline,
    /// Feature order the model was fitted with
    pub feature_names: Vec<String>,
    pub target_column: String,
    pub metrics: ModelMetrics,
    pub model_name: String,
    pub created_at: String,
    pub version: String,
}

impl ModelArtifact {
    pub fn new(
        model: Regressor,
        cleaner: TableCleaner,
        pipeline: FeaturePipeline,
        feature_names: Vec<String>,
        target_column: impl Into<String>,
        metrics: ModelMetrics,
    ) -> Self {
        let model_name = model.name().to_string();
        Self {
            model,
            cleaner,
            pipeline,
            feature_names,
            target_column: target_column.into(),
            metrics,
            model_name,
            created_at: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Write the artifact as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), model = %self.model_name, "saved model artifact");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DemandError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("artifact not found: {}", path.display()),
            )));
        }
        let json = fs::read_to_string(path)?;
        let artifact: Self = serde_json::from_str(&json)?;
        info!(path = %path.display(), model = %artifact.model_name, "loaded model artifact");
        Ok(artifact)
    }

    /// Score a raw frame: clean, transform, align columns, predict.
    /// The frame may carry extra columns; they are ignored. A frame
    /// missing any fitted feature's source column is rejected.
    pub fn predict_frame(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let prepared = self.cleaner.prepare(df)?;
        let transformed = self.pipeline.transform(&prepared)?;

        for name in &self.feature_names {
            if transformed.column(name.as_str()).is_err() {
                return Err(DemandError::ColumnNotFound(name.clone()));
            }
        }

        let x = design_matrix(&transformed, &self.feature_names)?;
        self.model.predict(&x)
    }
}
