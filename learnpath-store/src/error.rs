//! Error types for the libSQL store.

use learnpath_core::store::StoreError;
use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error from libSQL.
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data in the database.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<Error> for StoreError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidData(msg) => StoreError::InvalidData(msg),
            Error::Serialization(e) => StoreError::InvalidData(e.to_string()),
            Error::Database(e) => StoreError::Backend(e.to_string()),
        }
    }
}
