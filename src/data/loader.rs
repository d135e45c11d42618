//! CSV loading utilities

use crate::error::{DemandError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Loader for retail transaction exports
///
/// Only CSV input is supported; the exports this pipeline consumes are
/// plain comma-separated files with a header row.
#[derive(Debug, Clone)]
pub struct DataLoader {
    delimiter: u8,
    has_header: bool,
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            infer_schema_length: Some(100),
        }
    }
}

impl DataLoader {
    /// Create a loader with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether the file has a header row
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set the number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, n: Option<usize>) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Load a CSV file into a DataFrame
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DemandError::DataError(format!(
                "input file does not exist: {}",
                path.display()
            )));
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !ext.eq_ignore_ascii_case("csv") {
            return Err(DemandError::DataError(format!(
                "unsupported file format '{}', expected a .csv file",
                ext
            )));
        }

        let df = CsvReadOptions::default()
            .with_has_header(self.has_header)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(CsvParseOptions::default().with_separator(self.delimiter))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        if df.height() == 0 {
            return Err(DemandError::DataError(format!(
                "input file contains no rows: {}",
                path.display()
            )));
        }

        tracing::info!(
            rows = df.height(),
            cols = df.width(),
            path = %path.display(),
            "loaded dataset"
        );

        Ok(df)
    }

    /// Inspect a file without fully materializing statistics
    pub fn file_info(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let df = self.load(path)?;

        Ok(FileInfo {
            path: path.display().to_string(),
            file_size: metadata.len(),
            n_rows: df.height(),
            n_cols: df.width(),
            columns: df
                .get_column_names()
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }
}

/// Summary of a data file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub file_size: u64,
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<String>,
}

/// Writer for pipeline CSV outputs
pub struct DataSaver;

impl DataSaver {
    /// Save a DataFrame as CSV, creating parent directories as needed
    pub fn save_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = std::fs::File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut df.clone())?;

        tracing::debug!(rows = df.height(), path = %path.display(), "wrote csv");
        Ok(())
    }
}
