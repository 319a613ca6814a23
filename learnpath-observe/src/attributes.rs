//! Span field names shared by every service.

use learnpath_core::RequestContext;
use tracing::Span;

pub const REQUEST_ID: &str = "request_id";
pub const TENANT_ID: &str = "tenant_id";
pub const USER_ID: &str = "user_id";
pub const ANONYMOUS: &str = "anonymous";
pub const ATTEMPT: &str = "attempt";
pub const DOWNSTREAM: &str = "downstream";
pub const PLAN_ID: &str = "plan_id";
pub const QUIZ_ID: &str = "quiz_id";

/// Span wrapping one inbound request. Every log line emitted inside carries the
/// correlation id and caller scope.
pub fn request_span(ctx: &RequestContext, method: &str, path: &str) -> Span {
    tracing::info_span!(
        "request",
        request_id = %ctx.request_id,
        tenant_id = %ctx.tenant,
        user_id = ctx.user_id.as_ref().map(|u| u.as_str()).unwrap_or("-"),
        anonymous = ctx.anonymous,
        method = method,
        path = path,
    )
}
