use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("NODE_NOT_FOUND: {0}")]
    NodeNotFound(String),

    #[error("INVALID_DEPTH: {0} (expected 1..=5)")]
    InvalidDepth(usize),

    #[error("INVALID_PARAMS: {0}")]
    InvalidParams(String),

    #[error("QUERY_TOO_SHORT: query_text must be at least 3 characters")]
    QueryTooShort,

    #[error("EMPTY_HINTS: at least one hint is required")]
    EmptyHints,

    #[error("NO_EMBEDDINGS: index level is L1")]
    NoEmbeddings,

    #[error("UNKNOWN_KIND: no coverage rules for kind '{0}'")]
    UnknownKind(String),

    #[error("INDEX_UNAVAILABLE: {0}")]
    IndexUnavailable(String),

    #[error("EMBEDDING_FAILED: {0}")]
    EmbeddingFailed(String),

    #[error("TIMEOUT: query exceeded the hard deadline")]
    Timeout,
}

impl QueryError {
    /// Stable error code, the part before the colon in the display form.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::NodeNotFound(_) => "NODE_NOT_FOUND",
            QueryError::InvalidDepth(_) => "INVALID_DEPTH",
            QueryError::InvalidParams(_) => "INVALID_PARAMS",
            QueryError::QueryTooShort => "QUERY_TOO_SHORT",
            QueryError::EmptyHints => "EMPTY_HINTS",
            QueryError::NoEmbeddings => "NO_EMBEDDINGS",
            QueryError::UnknownKind(_) => "UNKNOWN_KIND",
            QueryError::IndexUnavailable(_) => "INDEX_UNAVAILABLE",
            QueryError::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            QueryError::Timeout => "TIMEOUT",
        }
    }
}
