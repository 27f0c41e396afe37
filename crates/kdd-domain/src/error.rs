use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("EMBEDDING_FAILED: {0}")]
    EmbeddingFailed(String),

    #[error("EMBEDDING_TIMEOUT: model call exceeded {0} ms")]
    EmbeddingTimeout(u64),

    #[error("API_KEY_MISSING: {0}")]
    ApiKeyMissing(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}
