//! Bearer-token verification settings

use serde::{Deserialize, Serialize};

/// How bearer tokens are checked before their claims are trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    /// Decode the payload only. For deployments behind a proxy that already verified the token.
    #[default]
    Unverified,
    /// HMAC-SHA256 with a shared secret.
    Hs256,
    /// RS256 against the identity provider's published JWKS.
    Jwks,
}

/// Authentication configuration for the gateway boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Admit requests without a bearer token as anonymous callers in the global tenant
    #[serde(default)]
    pub allow_anonymous: bool,

    #[serde(default)]
    pub mode: VerificationMode,

    /// Shared secret for `hs256` mode
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    /// JWKS endpoint for `jwks` mode
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// Expected `aud` claim, if any
    #[serde(default)]
    pub audience: Option<String>,

    /// Expected `iss` claim, if any
    #[serde(default)]
    pub issuer: Option<String>,

    /// Clock skew leeway in seconds for token expiry validation
    #[serde(default = "default_clock_skew")]
    pub clock_skew_seconds: u64,
}

fn default_clock_skew() -> u64 {
    60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_anonymous: false,
            mode: VerificationMode::default(),
            secret: None,
            jwks_url: None,
            audience: None,
            issuer: None,
            clock_skew_seconds: default_clock_skew(),
        }
    }
}

impl AuthConfig {
    pub fn hs256(secret: impl Into<String>) -> Self {
        Self {
            mode: VerificationMode::Hs256,
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    pub fn jwks(url: impl Into<String>) -> Self {
        Self {
            mode: VerificationMode::Jwks,
            jwks_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_anonymous(mut self, allow: bool) -> Self {
        self.allow_anonymous = allow;
        self
    }

    /// Check the config has what its mode needs
    pub fn is_valid(&self) -> bool {
        match self.mode {
            VerificationMode::Unverified => true,
            VerificationMode::Hs256 => self.secret.as_deref().is_some_and(|s| !s.is_empty()),
            VerificationMode::Jwks => self.jwks_url.as_deref().is_some_and(|u| !u.is_empty()),
        }
    }
}
