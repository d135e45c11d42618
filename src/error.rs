//! Error types for the demandcast pipeline

use thiserror::Error;

/// Result type alias for demandcast operations
pub type Result<T> = std::result::Result<T, DemandError>;

/// Main error type for the demandcast pipeline
#[derive(Error, Debug)]
pub enum DemandError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Model has not been fitted yet")]
    ModelNotFitted,

    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl From<polars::prelude::PolarsError> for DemandError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        DemandError::DataError(e.to_string())
    }
}

impl From<serde_json::Error> for DemandError {
    fn from(e: serde_json::Error) -> Self {
        DemandError::SerializationError(e.to_string())
    }
}

impl From<ndarray::ShapeError> for DemandError {
    fn from(e: ndarray::ShapeError) -> Self {
        DemandError::ShapeError {
            expected: "valid shape".to_string(),
            actual: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DemandError::ColumnNotFound("unit_price".to_string());
        assert_eq!(err.to_string(), "Column not found: unit_price");

        let err = DemandError::ShapeError {
            expected: "(10, 3)".to_string(),
            actual: "(10, 2)".to_string(),
        };
        assert!(err.to_string().contains("expected (10, 3)"));
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = DemandError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: "1.5".to_string(),
            reason: "must be in (0, 1)".to_string(),
        };
        assert!(err.to_string().contains("test_fraction=1.5"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DemandError = io_err.into();
        assert!(matches!(err, DemandError::IoError(_)));
    }
}
