//! Bearer authentication for the public gateway.

use std::sync::Arc;
use std::time::Duration;

use axum::Extension;
use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use learnpath_core::auth::bearer_token;
use learnpath_core::context::{IDEMPOTENCY_HEADER, REQUEST_ID_HEADER};
use learnpath_core::{AuthConfig, AuthContext, BearerValidator, RequestContext, RequestId};
use tracing::{debug, info};

use super::context::{header, scoped};
use crate::error::ApiError;

/// Authentication layer state
#[derive(Clone)]
pub struct AuthLayer {
    validator: Arc<BearerValidator>,
    allow_anonymous: bool,
    request_timeout: Duration,
}

impl AuthLayer {
    pub fn new(config: AuthConfig, request_timeout: Duration) -> Self {
        Self {
            allow_anonymous: config.allow_anonymous,
            validator: Arc::new(BearerValidator::new(config)),
            request_timeout,
        }
    }

    pub fn allows_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext, ApiError> {
        match authorization {
            Some(value) => {
                let token = bearer_token(value)?;
                let identity = self.validator.validate(token).await.map_err(|e| {
                    debug!(error = %e, "bearer token rejected");
                    ApiError::from(e)
                })?;
                Ok(AuthContext::Authenticated { identity })
            }
            None if self.allow_anonymous => Ok(AuthContext::Anonymous),
            None => Err(ApiError::from(learnpath_core::AuthError::MissingToken)),
        }
    }
}

/// Authenticate the caller and build the request context. Tenant and user come only
/// from the validated token; anonymous callers act in the global tenant.
pub async fn gateway_context(
    Extension(auth): Extension<AuthLayer>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let request_id = RequestId::from_header(header(headers, REQUEST_ID_HEADER));
    let idempotency_key = header(headers, IDEMPOTENCY_HEADER).map(str::to_string);
    let authorization = header(headers, AUTHORIZATION.as_str()).map(str::to_string);

    let auth_context = match auth.authenticate(authorization.as_deref()).await {
        Ok(auth_context) => auth_context,
        Err(err) => {
            let mut response = err.with_request_id(request_id.as_str()).into_response();
            if let Ok(value) = request_id.as_str().parse() {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            return response;
        }
    };

    let ctx = match auth_context.identity() {
        Some(identity) => RequestContext::new(request_id, identity.tenant.clone())
            .with_user(identity.user_id.clone()),
        None => {
            let ctx = RequestContext::anonymous(request_id);
            info!(request_id = %ctx.request_id, anonymous = true, "admitting anonymous request");
            ctx
        }
    }
    .with_idempotency_key(idempotency_key)
    .with_timeout(auth.request_timeout);

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(auth_context);
    request.extensions_mut().insert(ctx.clone());
    scoped(&ctx, &method, &path, next.run(request)).await
}
