//! Per-request context for the internal services.

use std::future::Future;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use learnpath_core::context::{IDEMPOTENCY_HEADER, REQUEST_ID_HEADER, TENANT_HEADER, USER_HEADER};
use learnpath_core::{ErrorCode, RequestContext, RequestId, TenantId};
use learnpath_observe::request_span;
use tracing::Instrument;

use crate::error::ApiError;

tokio::task_local! {
    static REQUEST_ID: RequestId;
}

/// Correlation id of the request being served on this task, if any.
pub(crate) fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.as_str().to_string()).ok()
}

pub(crate) fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Run the rest of the stack with the request's id in scope and inside its span,
/// then echo the id back on the response.
pub(crate) async fn scoped<F>(ctx: &RequestContext, method: &str, path: &str, inner: F) -> Response
where
    F: Future<Output = Response>,
{
    let span = request_span(ctx, method, path);
    let mut response = REQUEST_ID
        .scope(ctx.request_id.clone(), inner)
        .instrument(span)
        .await;
    if let Ok(value) = HeaderValue::from_str(ctx.request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Context for calls arriving from the gateway. Tenant and user travel as headers;
/// the gateway has already authenticated the caller.
pub async fn service_context(mut request: Request, next: Next) -> Response {
    let headers = request.headers();
    let request_id = RequestId::from_header(header(headers, REQUEST_ID_HEADER));
    let tenant = header(headers, TENANT_HEADER)
        .map(TenantId::new)
        .unwrap_or_default();
    let mut ctx = RequestContext::new(request_id, tenant).with_idempotency_key(
        header(headers, IDEMPOTENCY_HEADER).map(str::to_string),
    );
    match header(headers, USER_HEADER) {
        Some(user) => ctx = ctx.with_user(user),
        None => ctx.anonymous = true,
    }

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(ctx.clone());
    scoped(&ctx, &method, &path, next.run(request)).await
}

/// Extracts the [`RequestContext`] installed by the context middleware.
#[derive(Debug, Clone)]
pub struct Ctx(pub RequestContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(Ctx)
            .ok_or_else(|| ApiError::new(ErrorCode::Internal, "request context missing"))
    }
}
