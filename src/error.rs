//! Error types for the omics-integration library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum OmicsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Sample axes of two tables (or a table and a label vector) disagree.
    #[error("Sample alignment error: {0}")]
    SampleMismatch(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Unknown block '{0}'")]
    UnknownBlock(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Training did not converge after {iterations} iterations (last relative ELBO change {delta:.3e})")]
    Convergence { iterations: usize, delta: f64 },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Plotting error: {0}")]
    Plot(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Invalid sample ID pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Binary decoding error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

impl OmicsError {
    /// Wrap a plotting backend error.
    pub(crate) fn plot<E: std::fmt::Display>(err: E) -> Self {
        OmicsError::Plot(err.to_string())
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, OmicsError>;
