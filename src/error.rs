use std::path::PathBuf;

use thiserror::Error;

/// Malformed or cross-referencing-invalid dashboard configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("invalid config document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate element id '{0}'")]
    DuplicateId(String),
    #[error("'{0}' uses the reserved reset button id")]
    ReservedId(String),
    #[error("{owner}: column '{column}' not found in dataset")]
    UnknownColumn { owner: String, column: String },
    #[error("{owner}: width {width} is outside 1..=12")]
    InvalidWidth { owner: String, width: u8 },
    #[error("{owner}: y must be 'count', got '{found}'")]
    InvalidMeasure { owner: String, found: String },
    #[error("{owner}: orientation must be 'h' or 'v', got '{found}'")]
    InvalidOrientation { owner: String, found: String },
    #[error("{0}: treemap path must name at least one column")]
    EmptyPath(String),
}

/// Dataset source unreadable or missing required columns.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("failed to read dataset {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("input data must be a JSON array of objects")]
    NotAnArray,
    #[error("unsupported value type for field '{0}'")]
    UnsupportedValue(String),
    #[error("unsupported dataset file type: {0}")]
    UnsupportedFileType(PathBuf),
    #[error("dataset is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Per-visualization failure; never fatal, always replaced by the placeholder chart.
#[derive(Debug, Error, PartialEq)]
pub enum ChartBuildError {
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("no data to aggregate")]
    Empty,
    #[error("value '{value}' in column '{column}' is not numeric")]
    NotNumeric { column: String, value: String },
}
