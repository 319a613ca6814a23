//! Quiz engine errors.

use learnpath_core::ErrorCode;
use learnpath_core::store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuizError>;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("invalid quiz request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// None of the requested resources had usable cached content.
    #[error("no groundable content for the requested resources")]
    NoGroundableContent,

    /// Every generated question failed citation checks after all retries.
    #[error("generated questions could not be grounded ({rejected} rejected)")]
    UngroundableContent { rejected: usize },

    #[error("question generator unavailable: {0}")]
    GeneratorUnavailable(String),

    #[error("snippet store unavailable: {0}")]
    SnippetUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QuizError {
    pub fn code(&self) -> ErrorCode {
        match self {
            QuizError::Validation(_) => ErrorCode::InvalidRequest,
            QuizError::NotFound(_) | QuizError::Store(StoreError::NotFound(_)) => ErrorCode::NotFound,
            QuizError::NoGroundableContent => ErrorCode::NoGroundableContent,
            QuizError::UngroundableContent { .. } => ErrorCode::UngroundableContent,
            QuizError::GeneratorUnavailable(_) | QuizError::SnippetUnavailable(_) => {
                ErrorCode::DownstreamUnavailable
            }
            QuizError::Store(_) => ErrorCode::Internal,
        }
    }
}
