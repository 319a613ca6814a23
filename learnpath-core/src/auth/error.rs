//! Authentication error types

use thiserror::Error;

/// Errors that can occur during authentication
#[derive(Debug, Error)]
pub enum AuthError {
    /// No authentication token was provided in the request
    #[error("no authentication token provided")]
    MissingToken,

    /// The token format is invalid (not a bearer JWT)
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    /// The token signature verification failed
    #[error("token signature verification failed")]
    InvalidSignature,

    /// The token has expired
    #[error("token has expired")]
    Expired,

    /// The token's audience claim doesn't match the expected value
    #[error("invalid audience claim")]
    InvalidAudience,

    /// The key ID in the token doesn't match any known keys
    #[error("unknown key ID: {0}")]
    UnknownKeyId(String),

    /// Failed to fetch JWKS from the identity provider
    #[error("failed to fetch JWKS: {0}")]
    JwksFetchError(String),

    /// The verifier is missing settings its mode needs
    #[error("auth misconfigured: {0}")]
    Misconfigured(String),

    /// JWT decoding error from jsonwebtoken crate
    #[error("JWT error: {0}")]
    JwtError(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            _ => AuthError::JwtError(err),
        }
    }
}
