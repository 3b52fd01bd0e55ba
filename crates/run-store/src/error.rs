use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unable to determine a data directory")]
    NoDataDir,
    #[error("io error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
