use std::path::PathBuf;
use thiserror::Error;

/// The main error type for ctrdal operations.
#[derive(Debug, Error)]
pub enum DalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to resolve {field} '{value}': {message}")]
    Configuration {
        field: &'static str,
        value: String,
        message: String,
    },

    #[error("{path} already exists")]
    AlreadyExists { path: PathBuf },

    #[error("{path} not found")]
    NotFound { path: PathBuf },

    #[error("Descriptor '{name}' has no remote location (bucket and object key) to download from")]
    MissingRemoteLocation { name: String },

    #[error("Payload does not match the {format} format of {path}")]
    PayloadMismatch { path: PathBuf, format: &'static str },

    #[error("Failed to parse CSV from {path}: {source}")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write CSV to {path}: {source}")]
    CsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Row {row} of {path} has {found} field(s), expected {expected}")]
    RowShape {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Column '{column}' not found in {path}")]
    UnknownColumn { path: PathBuf, column: String },

    #[error("Failed to read columnar data from {path}: {message}")]
    ColumnarRead { path: PathBuf, message: String },

    #[error("Failed to write columnar data to {path}: {message}")]
    ColumnarWrite { path: PathBuf, message: String },

    #[error("Execution session error: {message}")]
    Session { message: String },

    #[error("Failed to parse YAML document {path}: {source}")]
    DocumentParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write YAML document {path}: {source}")]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Transfer from bucket '{bucket}' failed for '{key}': {message}")]
    Transfer {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Download from bucket '{bucket}' incomplete: {} object(s) failed", .failed.len())]
    IncompleteTransfer { bucket: String, failed: Vec<String> },

    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },

    #[error("Failed to render JSON output: {0}")]
    JsonOutput(#[source] serde_json::Error),
}
