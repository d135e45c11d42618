//! Structural cleaning of raw transaction exports
//!
//! Everything here is either row-local or a pure dataset operation
//! (duplicate removal). Nothing is fitted, so the cleaner can run before
//! the train/test split without leaking test information into training.

use crate::error::{DemandError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Configuration for [`TableCleaner`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Target column; rows with a missing target are dropped
    pub target_column: String,
    /// Identifier columns removed from the table
    pub id_columns: Vec<String>,
    /// Date columns expanded into year/month/day/weekday parts
    pub date_columns: Vec<String>,
    /// Skewed numeric columns that get an extra log1p feature
    pub log_columns: Vec<String>,
    /// Remove exact duplicate rows
    pub dedupe: bool,
}

impl CleanConfig {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            id_columns: Vec::new(),
            date_columns: Vec::new(),
            log_columns: Vec::new(),
            dedupe: true,
        }
    }

    /// Drop these identifier columns
    pub fn with_id_columns(mut self, columns: Vec<impl Into<String>>) -> Self {
        self.id_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Expand these date columns into calendar parts
    pub fn with_date_columns(mut self, columns: Vec<impl Into<String>>) -> Self {
        self.date_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add log1p features for these columns
    pub fn with_log_columns(mut self, columns: Vec<impl Into<String>>) -> Self {
        self.log_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable duplicate removal
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }
}

/// Structural cleaner for raw exports
///
/// Configured columns that are absent from a given frame are skipped, so
/// the same cleaner works on partial exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCleaner {
    config: CleanConfig,
}

impl TableCleaner {
    pub fn new(config: CleanConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CleanConfig {
        &self.config
    }

    /// Clean a raw training export
    ///
    /// Removes duplicates and rows without a target value, then applies
    /// the column transforms shared with [`TableCleaner::prepare`].
    pub fn clean(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut df = df.clone();

        if self.config.dedupe {
            let before = df.height();
            df = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
            let removed = before - df.height();
            if removed > 0 {
                tracing::info!(removed, "dropped duplicate rows");
            }
        }

        if df.get_column_names()
            .iter()
            .any(|c| c.as_str() == self.config.target_column)
        {
            let before = df.height();
            let mask = df.column(&self.config.target_column)?.is_not_null();
            df = df.filter(&mask)?;
            let removed = before - df.height();
            if removed > 0 {
                tracing::info!(removed, "dropped rows with missing target");
            }
        } else {
            return Err(DemandError::ColumnNotFound(
                self.config.target_column.clone(),
            ));
        }

        if df.height() == 0 {
            return Err(DemandError::DataError(
                "no rows left after cleaning".to_string(),
            ));
        }

        self.apply_column_transforms(df)
    }

    /// Prepare a frame for prediction
    ///
    /// Applies the same column transforms as [`TableCleaner::clean`] but
    /// keeps every input row, so predictions line up with the input. The
    /// target column is not required.
    pub fn prepare(&self, df: &DataFrame) -> Result<DataFrame> {
        self.apply_column_transforms(df.clone())
    }

    fn apply_column_transforms(&self, mut df: DataFrame) -> Result<DataFrame> {
        for col in &self.config.id_columns {
            if has_column(&df, col) {
                df = df.drop(col)?;
            }
        }

        df = coerce_flag_columns(df)?;
        df = coerce_numeric_strings(&df, &self.config.target_column)?;

        for col in &self.config.date_columns {
            if has_column(&df, col) {
                df = expand_date_column(df, col)?;
            }
        }

        for col in &self.config.log_columns {
            if has_column(&df, col) {
                df = add_log_column(df, col)?;
            }
        }

        Ok(df)
    }
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Cast boolean columns and boolean-looking string columns to 0/1
fn coerce_flag_columns(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    for name in names {
        let col = df.column(&name)?;

        match col.dtype() {
            DataType::Boolean => {
                let casted = col.cast(&DataType::Int32)?;
                df.with_column(casted.as_materialized_series().clone())?;
            }
            DataType::String => {
                let ca = col.str()?;
                if let Some(flags) = parse_flag_values(ca) {
                    let series: Int32Chunked = flags.into_iter().collect();
                    df.with_column(series.with_name(name.as_str().into()).into_series())?;
                }
            }
            _ => {}
        }
    }

    Ok(df)
}

/// Interpret a string column as 0/1 flags, or None if any value does not
/// look boolean
fn parse_flag_values(ca: &StringChunked) -> Option<Vec<Option<i32>>> {
    let mut out = Vec::with_capacity(ca.len());
    let mut seen_value = false;

    for opt in ca.into_iter() {
        match opt {
            None => out.push(None),
            Some(s) => {
                let flag = match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => 1,
                    "false" | "no" | "0" => 0,
                    _ => return None,
                };
                seen_value = true;
                out.push(Some(flag));
            }
        }
    }

    if seen_value {
        Some(out)
    } else {
        None
    }
}

/// Cast string columns whose values all parse as numbers to Float64
fn coerce_numeric_strings(df: &DataFrame, target: &str) -> Result<DataFrame> {
    let mut df = df.clone();
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    for name in names {
        let col = df.column(&name)?;
        if col.dtype() != &DataType::String {
            continue;
        }

        let ca = col.str()?;
        let mut values: Vec<Option<f64>> = Vec::with_capacity(ca.len());
        let mut all_numeric = true;
        let mut seen_value = false;

        for opt in ca.into_iter() {
            match opt {
                None => values.push(None),
                Some(s) => match s.trim().parse::<f64>() {
                    Ok(v) => {
                        seen_value = true;
                        values.push(Some(v));
                    }
                    Err(_) => {
                        all_numeric = false;
                        break;
                    }
                },
            }
        }

        if all_numeric && seen_value {
            let series: Float64Chunked = values.into_iter().collect();
            df.with_column(series.with_name(name.as_str().into()).into_series())?;
        } else if name == target {
            return Err(DemandError::DataError(format!(
                "target column '{}' contains non-numeric values",
                target
            )));
        }
    }

    Ok(df)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s.trim(), DATETIME_FORMAT) {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Replace a raw date column with year/month/day/weekday parts
///
/// Weekday is 0 for Monday through 6 for Sunday. Unparseable values
/// become nulls in every part and are imputed later.
fn expand_date_column(mut df: DataFrame, col: &str) -> Result<DataFrame> {
    let series = df.column(col)?;

    let dates: Vec<Option<NaiveDate>> = match series.dtype() {
        DataType::String => series.str()?.into_iter().map(|opt| opt.and_then(parse_date)).collect(),
        other => {
            return Err(DemandError::PreprocessingError(format!(
                "date column '{}' has unsupported dtype {:?}",
                col, other
            )))
        }
    };

    let parsed = dates.iter().filter(|d| d.is_some()).count();
    if parsed == 0 {
        return Err(DemandError::PreprocessingError(format!(
            "no value in date column '{}' matches '{}' or '{}'",
            col, DATETIME_FORMAT, DATE_FORMAT
        )));
    }

    let years: Int32Chunked = dates.iter().map(|d| d.map(|d| d.year())).collect();
    let months: Int32Chunked = dates.iter().map(|d| d.map(|d| d.month() as i32)).collect();
    let days: Int32Chunked = dates.iter().map(|d| d.map(|d| d.day() as i32)).collect();
    let weekdays: Int32Chunked = dates
        .iter()
        .map(|d| d.map(|d| d.weekday().num_days_from_monday() as i32))
        .collect();

    df.with_column(years.with_name(format!("{}_year", col).into()).into_series())?;
    df.with_column(months.with_name(format!("{}_month", col).into()).into_series())?;
    df.with_column(days.with_name(format!("{}_day", col).into()).into_series())?;
    df.with_column(
        weekdays
            .with_name(format!("{}_weekday", col).into())
            .into_series(),
    )?;

    Ok(df.drop(col)?)
}

/// Add a `{col}_log` column holding ln(1 + value)
fn add_log_column(mut df: DataFrame, col: &str) -> Result<DataFrame> {
    let series = df.column(col)?.cast(&DataType::Float64)?;
    let ca = series.f64()?;

    let logged: Float64Chunked = ca
        .into_iter()
        .map(|opt| {
            opt.and_then(|v| {
                let l = v.ln_1p();
                if l.is_finite() {
                    Some(l)
                } else {
                    None
                }
            })
        })
        .collect();

    df.with_column(
        logged
            .with_name(format!("{}_log", col).into())
            .into_series(),
    )?;
    Ok(df)
}
