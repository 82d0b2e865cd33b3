use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("mode must be one of 'names', 'bounds' or 'both', got '{0}'")]
    InvalidMode(String),

    #[error("file '{0}' is not configured in the lookup table")]
    NotFound(String),

    #[error("got {headers} header entries for {names} file names")]
    HeaderMismatch { names: usize, headers: usize },

    #[error("header row {row} is past the end of {path:?}")]
    MissingHeader { row: usize, path: PathBuf },

    #[error("key '{0}' holds a column bound, not a nested table")]
    LeafCollision(String),

    #[error("file name '{0}' appears more than once in the lookup table")]
    DuplicateName(String),

    #[error("sample '{0}' is empty")]
    EmptySample(&'static str),

    #[error("need at least {needed} observations per sample, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("csv error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
