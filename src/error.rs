//! Error types shared by both pipelines.

use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use zip::result::ZipError;

/// Errors raised while building the crosswalk or the UBPR panel.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// No member file across all archives yielded a usable identifier table.
    #[error("no valid files found with IDRSSD and CERT columns in {}", .dir.display())]
    EmptyInput { dir: PathBuf },

    /// No year produced a merged table, so there is nothing to concatenate.
    #[error("no yearly UBPR tables were produced from {}", .dir.display())]
    NoYearlyData { dir: PathBuf },

    /// A member file lacks one or more required columns.
    #[error("missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// A member file has no header row.
    #[error("file has no header row")]
    NoHeader,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Zip error: {0}")]
    Zip(#[from] ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob error: {0}")]
    Glob(#[from] glob::PatternError),
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, EtlError>;
