use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the toolkit.
///
/// Format, template and configuration problems are fatal and surface before
/// any artifact is written. Per-line and per-record mismatches are never
/// errors; they land in the unmatched partition instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid log format {format:?}: {reason}")]
    Format { format: String, reason: String },

    #[error("invalid template {id}: {source}")]
    Template {
        id: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid preprocess pattern {pattern:?}: {source}")]
    Preprocess {
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("grid point {index} failed with parameters {parameters:?}")]
    GridPoint {
        index: usize,
        parameters: BTreeMap<String, f64>,
        #[source]
        source: Box<Error>,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("{}: {reason}", path.display())]
    Evaluation { path: PathBuf, reason: String },
}

impl Error {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
