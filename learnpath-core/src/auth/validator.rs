//! Bearer token validation with JWKS caching

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{AuthConfig, AuthError, Identity, VerificationMode};
use crate::context::TenantId;

/// JWKS cache TTL (1 hour)
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let header = header.trim();
    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AuthError::InvalidFormat("expected 'Bearer <token>'".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidFormat(format!(
            "unsupported authorization scheme '{scheme}'"
        )));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Validates bearer tokens according to the configured [`VerificationMode`]
pub struct BearerValidator {
    config: AuthConfig,
    jwks_cache: Arc<RwLock<JwksCache>>,
    http_client: reqwest::Client,
}

struct JwksCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl JwksCache {
    fn new() -> Self {
        Self {
            keys: HashMap::new(),
            fetched_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        match self.fetched_at {
            Some(fetched_at) => fetched_at.elapsed() > JWKS_CACHE_TTL,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    tenant_id: Option<String>,
    #[serde(default)]
    app_metadata: Option<AppMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    tenant_id: Option<String>,
}

impl TokenClaims {
    fn into_identity(self) -> Result<Identity, AuthError> {
        let sub = self
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::InvalidFormat("missing sub claim".to_string()))?;

        let tenant = self
            .app_metadata
            .and_then(|m| m.tenant_id)
            .or(self.tenant_id)
            .map(TenantId::new)
            .unwrap_or_default();

        let mut identity = Identity::new(sub, tenant);
        if let Some(email) = self.email {
            identity = identity.with_email(email);
        }
        if let Some(expires_at) = self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)) {
            identity = identity.with_expiry(expires_at);
        }
        Ok(identity)
    }
}

impl BearerValidator {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            jwks_cache: Arc::new(RwLock::new(JwksCache::new())),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Validate a token and return the caller identity
    pub async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = match self.config.mode {
            VerificationMode::Unverified => self.decode_unverified(token)?,
            VerificationMode::Hs256 => {
                let secret = self
                    .config
                    .secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AuthError::Misconfigured("hs256 requires a secret".into()))?;
                let key = DecodingKey::from_secret(secret.as_bytes());
                decode::<TokenClaims>(token, &key, &self.validation(Algorithm::HS256))?.claims
            }
            VerificationMode::Jwks => {
                let header = decode_header(token)?;
                let kid = header.kid.ok_or_else(|| {
                    AuthError::InvalidFormat("missing kid in token header".to_string())
                })?;
                let key = self.get_key(&kid).await?;
                decode::<TokenClaims>(token, &key, &self.validation(Algorithm::RS256))?.claims
            }
        };
        claims.into_identity()
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        match &self.config.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &self.config.issuer {
            validation.set_issuer(&[iss]);
        }
        validation.leeway = self.config.clock_skew_seconds;
        validation
    }

    /// Decode the payload segment without checking the signature.
    fn decode_unverified(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut parts = token.split('.');
        let (Some(_), Some(payload), Some(_), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidFormat(
                "token must have three segments".to_string(),
            ));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| AuthError::InvalidFormat(format!("payload is not base64url: {e}")))?;
        let claims: TokenClaims = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::InvalidFormat(format!("payload is not JSON: {e}")))?;

        if let Some(exp) = claims.exp {
            let leeway = i64::try_from(self.config.clock_skew_seconds).unwrap_or(i64::MAX);
            if exp.saturating_add(leeway) < Utc::now().timestamp() {
                return Err(AuthError::Expired);
            }
        }
        Ok(claims)
    }

    /// Get a decoding key by kid, fetching JWKS if needed
    async fn get_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.jwks_cache.read().await;
            if !cache.is_expired() {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        // Cache miss, expired, or rotated key
        self.refresh_jwks().await?;

        let cache = self.jwks_cache.read().await;
        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::UnknownKeyId(kid.to_string()))
    }

    /// Force refresh the JWKS cache
    pub async fn refresh_jwks(&self) -> Result<(), AuthError> {
        let url = self
            .config
            .jwks_url
            .as_deref()
            .ok_or_else(|| AuthError::Misconfigured("jwks mode requires jwks_url".into()))?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetchError(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }

        let jwks: JwksResponse = response
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            if jwk.kty == "RSA" {
                let key = DecodingKey::from_rsa_components(&n, &e)
                    .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;
                keys.insert(kid, key);
            }
        }

        let mut cache = self.jwks_cache.write().await;
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn sign(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("bearer   abc ").unwrap(), "abc");
        assert!(matches!(
            bearer_token("Basic abc"),
            Err(AuthError::InvalidFormat(_))
        ));
        assert!(matches!(bearer_token("abc"), Err(AuthError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn test_unverified_reads_app_metadata_tenant() {
        let token = sign(
            json!({"sub": "user-1", "exp": future_exp(), "app_metadata": {"tenant_id": "acme"}}),
            "ignored",
        );
        let validator = BearerValidator::new(AuthConfig::default());
        let identity = validator.validate(&token).await.unwrap();
        assert_eq!(identity.user_id.as_str(), "user-1");
        assert_eq!(identity.tenant.as_str(), "acme");
        assert!(identity.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_unverified_defaults_tenant_to_global() {
        let token = sign(json!({"sub": "user-1"}), "ignored");
        let validator = BearerValidator::new(AuthConfig::default());
        let identity = validator.validate(&token).await.unwrap();
        assert!(identity.tenant.is_global());
    }

    #[tokio::test]
    async fn test_unverified_rejects_garbage_and_expired() {
        let validator = BearerValidator::new(AuthConfig::default());
        assert!(matches!(
            validator.validate("not-a-jwt").await,
            Err(AuthError::InvalidFormat(_))
        ));

        let expired = sign(json!({"sub": "u", "exp": 1_000}), "ignored");
        assert!(matches!(
            validator.validate(&expired).await,
            Err(AuthError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_missing_subject_is_rejected() {
        let token = sign(json!({"exp": future_exp()}), "ignored");
        let validator = BearerValidator::new(AuthConfig::default());
        assert!(matches!(
            validator.validate(&token).await,
            Err(AuthError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_hs256_checks_signature() {
        let validator = BearerValidator::new(AuthConfig::hs256("right"));

        let good = sign(json!({"sub": "u", "exp": future_exp(), "tenant_id": "acme"}), "right");
        let identity = validator.validate(&good).await.unwrap();
        assert_eq!(identity.tenant.as_str(), "acme");

        let bad = sign(json!({"sub": "u", "exp": future_exp()}), "wrong");
        assert!(matches!(
            validator.validate(&bad).await,
            Err(AuthError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn test_hs256_without_secret_is_misconfigured() {
        let mut config = AuthConfig::default();
        config.mode = VerificationMode::Hs256;
        let validator = BearerValidator::new(config);
        let token = sign(json!({"sub": "u", "exp": future_exp()}), "x");
        assert!(matches!(
            validator.validate(&token).await,
            Err(AuthError::Misconfigured(_))
        ));
    }
}
