//! Replay cache for client-supplied idempotency keys.

use std::time::Duration;

use moka::sync::Cache;

use crate::context::RequestContext;

/// Default replay window.
pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(600);

const MAX_ENTRIES: u64 = 10_000;

/// Remembers the result of a mutating operation for a time window, keyed by
/// operation, tenant, user and the caller's idempotency key.
#[derive(Clone)]
pub struct IdempotencyCache<V: Clone + Send + Sync + 'static> {
    entries: Cache<String, V>,
}

impl<V: Clone + Send + Sync + 'static> IdempotencyCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    fn key(operation: &str, ctx: &RequestContext) -> Option<String> {
        let key = ctx.idempotency_key.as_deref()?;
        Some(format!(
            "{operation}\u{1f}{}\u{1f}{}\u{1f}{key}",
            ctx.tenant,
            ctx.owner()
        ))
    }

    /// Prior result for this request, if the caller sent a key seen within the window.
    pub fn lookup(&self, operation: &str, ctx: &RequestContext) -> Option<V> {
        Self::key(operation, ctx).and_then(|k| self.entries.get(&k))
    }

    pub fn remember(&self, operation: &str, ctx: &RequestContext, value: V) {
        if let Some(k) = Self::key(operation, ctx) {
            self.entries.insert(k, value);
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Default for IdempotencyCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_IDEMPOTENCY_TTL)
    }
}
