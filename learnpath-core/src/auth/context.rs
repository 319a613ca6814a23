//! Authentication context types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::TenantId;
use crate::ids::UserId;

/// Authentication context for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AuthContext {
    /// Bearer token accepted
    Authenticated {
        /// The caller's identity
        identity: Identity,
    },
    /// No token; admitted because anonymous access is enabled
    Anonymous,
}

impl AuthContext {
    /// Returns the identity if authenticated, None otherwise
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthContext::Authenticated { identity } => Some(identity),
            AuthContext::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthContext::Authenticated { .. })
    }

    /// Tenant the caller acts in. Anonymous callers only see global content.
    pub fn tenant(&self) -> TenantId {
        self.identity()
            .map(|i| i.tenant.clone())
            .unwrap_or_default()
    }
}

/// Identity extracted from a bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Token subject
    pub user_id: UserId,
    /// Tenant claim, `global` when absent
    pub tenant: TenantId,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, tenant: TenantId) -> Self {
        Self {
            user_id: user_id.into(),
            tenant,
            email: None,
            expires_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_context_authenticated() {
        let identity = Identity::new("user-1", TenantId::new("acme"));
        let ctx = AuthContext::Authenticated {
            identity: identity.clone(),
        };
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.identity(), Some(&identity));
        assert_eq!(ctx.tenant().as_str(), "acme");
    }

    #[test]
    fn test_auth_context_anonymous_is_global() {
        let ctx = AuthContext::Anonymous;
        assert!(!ctx.is_authenticated());
        assert!(ctx.tenant().is_global());
    }

    #[test]
    fn test_auth_context_serialize() {
        let identity = Identity::new("user-1", TenantId::global()).with_email("a@example.com");
        let json = serde_json::to_string(&AuthContext::Authenticated { identity }).unwrap();
        assert!(json.contains("\"source\":\"authenticated\""));
        assert!(json.contains("a@example.com"));

        let json = serde_json::to_string(&AuthContext::Anonymous).unwrap();
        assert_eq!(json, r#"{"source":"anonymous"}"#);
    }
}
