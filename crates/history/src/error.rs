use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("failed to prepare history database directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history storage worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, HistoryError>;
