use std::path::PathBuf;

use polars::prelude::PolarsError;
use smartcore::error::Failed;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cannot access {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("model fit failed: {0}")]
    Model(#[from] Failed),
    #[error("column {column:?} has an unresolved missing value at row {row}")]
    UnresolvedMissing { column: String, row: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unknown variable {0:?} in background knowledge")]
    UnknownVariable(String),
    #[error("not enough data: {0}")]
    Empty(String),
    #[error("cannot render report: {0}")]
    Report(#[from] std::fmt::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
