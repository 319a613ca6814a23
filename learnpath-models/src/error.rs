//! Error types for model providers.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during model operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials not found for provider.
    #[error("credentials not found for provider: {0}")]
    CredentialsNotFound(String),

    /// Operation not offered by this provider.
    #[error("{operation} not supported by provider '{provider}'")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    /// Provider API returned a non-success status or an unexpected body.
    #[error("provider API error: {0}")]
    ProviderApi(String),

    /// Request failed before a response arrived (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Request(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats_correctly() {
        let err = Error::Unsupported {
            provider: "openrouter".into(),
            operation: "rerank",
        };
        assert_eq!(err.to_string(), "rerank not supported by provider 'openrouter'");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err: serde_json::Error = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
