//! API keys for hosted model providers.
//!
//! Keys are read from the environment and held as [`SecretString`] so they never
//! reach logs or `Debug` output.

use std::env;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::{Error, Result};

/// A secure API key that prevents accidental logging.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Expose the secret key value.
    ///
    /// Use sparingly - only when actually sending to an API.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Environment variable names for each provider.
const ENV_VARS: &[(&str, &str)] = &[
    ("deepinfra", "DEEPINFRA_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("openai", "OPENAI_API_KEY"),
    ("qdrant", "QDRANT_API_KEY"),
];

/// Get the environment variable name for a provider.
pub fn env_var_for_provider(provider: &str) -> Option<&'static str> {
    ENV_VARS
        .iter()
        .find(|(p, _)| *p == provider)
        .map(|(_, var)| *var)
}

/// Resolves provider credentials from the environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialStore;

impl CredentialStore {
    pub fn new() -> Self {
        Self
    }

    /// Look up the key for a provider. Empty values count as missing.
    pub fn get(&self, provider: &str) -> Result<ApiKey> {
        self.find(provider)
            .ok_or_else(|| Error::CredentialsNotFound(provider.to_string()))
    }

    /// Like [`get`](Self::get) but optional, for providers that run without auth locally.
    pub fn find(&self, provider: &str) -> Option<ApiKey> {
        let var = env_var_for_provider(provider)?;
        match env::var(var) {
            Ok(value) if !value.trim().is_empty() => {
                debug!(provider, var, "loaded API key from environment");
                Some(ApiKey::new(value.trim()))
            }
            _ => None,
        }
    }
}
