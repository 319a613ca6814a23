//! Retrieval pipeline errors.

use learnpath_core::ErrorCode;
use learnpath_core::store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid search request: {0}")]
    InvalidRequest(String),

    /// The embedding model could not be reached. Fails the whole search.
    #[error("embedding model unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Cross-encoder failure. Searches degrade to vector order instead of surfacing this.
    #[error("reranker failed: {0}")]
    Rerank(String),

    #[error("ingestion is not configured")]
    IngestUnavailable,

    /// Error reported by a retrieval service reached over the network.
    #[error("retrieval service error ({code}): {message}")]
    Remote { code: ErrorCode, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RetrievalError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RetrievalError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            RetrievalError::EmbeddingUnavailable(_)
            | RetrievalError::IndexUnavailable(_)
            | RetrievalError::IngestUnavailable => ErrorCode::DownstreamUnavailable,
            RetrievalError::Remote { code, .. } => *code,
            RetrievalError::Rerank(_) | RetrievalError::Store(_) => ErrorCode::Internal,
        }
    }
}
