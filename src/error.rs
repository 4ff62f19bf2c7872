use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems with the input file. Row-level data quality issues never
/// end up here; they are normalized during derivation instead.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Input file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Required column '{column}' (field {field}) is missing from {}", path.display())]
    MissingColumn {
        field: &'static str,
        column: String,
        path: PathBuf,
    },

    #[error("Invalid price '{value}' on line {line}")]
    InvalidPrice { line: u64, value: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type LoadResult<T> = Result<T, LoadError>;
