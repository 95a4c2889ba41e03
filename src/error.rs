use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source data file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Destination error: {0}")]
    Destination(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Record {index} for table '{table}' has no non-empty string 'id'")]
    MissingPrimaryKey { table: String, index: usize },

    #[error("Invalid record for table '{table}': {message}")]
    InvalidRecord { table: String, message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
