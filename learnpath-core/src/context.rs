//! Per-request context carried from the gateway boundary to every component.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::UserId;

/// Correlation id header, echoed on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Tenant scope header set by the gateway on internal calls.
pub const TENANT_HEADER: &str = "x-tenant-id";
/// Caller identity header set by the gateway on internal calls.
pub const USER_HEADER: &str = "x-user-id";
/// Optional client-supplied idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Tenant scope of a caller or a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Scope shared by every tenant.
    pub const GLOBAL: &'static str = "global";

    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.trim().is_empty() {
            Self::global()
        } else {
            Self(id)
        }
    }

    pub fn global() -> Self {
        Self(Self::GLOBAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_global(&self) -> bool {
        self.0 == Self::GLOBAL
    }

    /// Whether a record scoped to `scope` is visible to this tenant.
    pub fn can_see(&self, scope: &TenantId) -> bool {
        scope.is_global() || scope == self
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque correlation id propagated across the call chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh id for requests that arrive without one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use the inbound header value when it is usable, otherwise mint one.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() && v.len() <= 128 => Self(v.to_string()),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a component needs to know about the caller of one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub tenant: TenantId,
    pub user_id: Option<UserId>,
    pub anonymous: bool,
    pub idempotency_key: Option<String>,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(request_id: RequestId, tenant: TenantId) -> Self {
        Self {
            request_id,
            tenant,
            user_id: None,
            anonymous: false,
            idempotency_key: None,
            deadline: None,
        }
    }

    /// Context for requests admitted without credentials.
    pub fn anonymous(request_id: RequestId) -> Self {
        Self {
            anonymous: true,
            ..Self::new(request_id, TenantId::global())
        }
    }

    pub fn with_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when the request is unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }

    /// User id used for ownership of stored records.
    pub fn owner(&self) -> UserId {
        self.user_id
            .clone()
            .unwrap_or_else(|| UserId::new("anonymous"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tenant_falls_back_to_global() {
        assert!(TenantId::new("  ").is_global());
        assert_eq!(TenantId::new("acme").as_str(), "acme");
    }

    #[test]
    fn tenant_visibility_covers_own_and_global_only() {
        let acme = TenantId::new("acme");
        assert!(acme.can_see(&TenantId::global()));
        assert!(acme.can_see(&TenantId::new("acme")));
        assert!(!acme.can_see(&TenantId::new("other-tenant")));
        assert!(!TenantId::global().can_see(&acme));
    }

    #[test]
    fn request_id_reuses_inbound_value() {
        assert_eq!(RequestId::from_header(Some("abc")).as_str(), "abc");
        assert_ne!(RequestId::from_header(Some("")).as_str(), "");
        assert_eq!(RequestId::from_header(None).as_str().len(), 36);
    }

    #[test]
    fn anonymous_context_is_global() {
        let ctx = RequestContext::anonymous(RequestId::generate());
        assert!(ctx.anonymous);
        assert!(ctx.tenant.is_global());
        assert_eq!(ctx.owner().as_str(), "anonymous");
    }

    #[test]
    fn deadline_tracks_remaining_time() {
        let ctx = RequestContext::new(RequestId::generate(), TenantId::global());
        assert!(ctx.remaining().is_none());

        let ctx = ctx.with_timeout(Duration::from_secs(30));
        assert!(ctx.remaining().unwrap() <= Duration::from_secs(30));
        assert!(!ctx.is_expired());

        let ctx = ctx.with_timeout(Duration::ZERO);
        assert!(ctx.is_expired());
    }

    #[test]
    fn blank_idempotency_key_is_ignored() {
        let ctx = RequestContext::new(RequestId::generate(), TenantId::global())
            .with_idempotency_key(Some(" ".into()));
        assert!(ctx.idempotency_key.is_none());
    }
}
