use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Partition;

/// Fatal failures of the preparation pipelines.
///
/// Per-record problems (malformed lines, missing or undecodable images) are
/// never reported through this type; they are counted in the run statistics.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("configuration error for '{}': {reason}", path.display())]
    Configuration { path: PathBuf, reason: String },
    #[error("folder id '{folder_id}' is listed in both the {first} and {second} splits")]
    OverlappingSplits {
        first: Partition,
        second: Partition,
        folder_id: String,
    },
    #[error("image store '{}' is full (capacity {capacity} bytes)", path.display())]
    StoreFull { path: PathBuf, capacity: usize },
    #[error("image store failure: {0}")]
    Store(#[from] heed::Error),
    #[error("failed to write run report: {0}")]
    Report(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PrepError {
    pub(crate) fn missing_path(path: impl Into<PathBuf>) -> Self {
        PrepError::Configuration {
            path: path.into(),
            reason: "path does not exist".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
