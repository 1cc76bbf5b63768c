use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while loading inputs or configuration.
///
/// Violations of the documented preconditions of the pure functions
/// in [`crate::scale`] and [`crate::legend`] panic instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read {}: {source}", path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("column {0:?} not found in CSV header")]
    MissingColumn(String),
    #[error("invalid color {0:?} (expected #rgb or #rrggbb)")]
    InvalidColor(String),
    #[error("invalid number format {spec:?}: {reason}")]
    InvalidFormat { spec: String, reason: &'static str },
    #[error("topology has no object named {0:?}")]
    UnknownObject(String),
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}
