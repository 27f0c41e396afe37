use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] kdd_store::StoreError),

    #[error("GIT_NOT_AVAILABLE: {0}")]
    GitNotAvailable(String),

    #[error("COMMIT_NOT_FOUND: {0}")]
    CommitNotFound(String),

    #[error("EXTRACTION_FAILED: {path}: {message}")]
    ExtractionFailed { path: String, message: String },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("task join failed: {0}")]
    Join(String),
}
