//! Error handling for WSN preprocessing operations.
//!
//! Provides error types with enough context (file, column, row) to tell
//! a corrupt source file apart from a misconfigured run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory traversal error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid node range {start}-{end}: ids must satisfy 1 <= start <= end <= 9999")]
    InvalidRange { start: u32, end: u32 },

    #[error("Path does not contain a node range (node<start>-<end>): {path}")]
    UnparsableRange { path: PathBuf },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Schema mismatch in file {path}: expected at least {expected} columns, found {found}")]
    SchemaMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("Malformed scale value {value:?} in column {column} (data row {row}) of file {path}")]
    MalformedScale {
        path: PathBuf,
        column: String,
        row: usize,
        value: String,
    },

    #[error("Malformed node id {value:?} in column {column} (data row {row}) of file {path}")]
    MalformedNodeId {
        path: PathBuf,
        column: String,
        row: usize,
        value: String,
    },

    #[error("Invalid source file {path}: {reason}")]
    InvalidSourceFile { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl WsnError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Errors caused by the content of a source file rather than the environment.
    ///
    /// A file failing with one of these is left out of the ledger so a corrected
    /// copy is picked up by a later run.
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            Self::SchemaMismatch { .. }
                | Self::MalformedScale { .. }
                | Self::MalformedNodeId { .. }
                | Self::InvalidSourceFile { .. }
                | Self::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WsnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_message() {
        let err = WsnError::InvalidRange { start: 5, end: 2 };
        assert!(err.to_string().contains("5-2"));
    }

    #[test]
    fn test_data_quality_classification() {
        let scale = WsnError::MalformedScale {
            path: PathBuf::from("a.csv"),
            column: "0001:Scale1".to_string(),
            row: 3,
            value: "x".to_string(),
        };
        assert!(scale.is_data_quality());
        assert!(!WsnError::configuration("missing path").is_data_quality());
        assert!(
            !WsnError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))
                .is_data_quality()
        );
    }
}
