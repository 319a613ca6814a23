//! Internal service surfaces reached by the gateway.
//!
//! Each router serves one component's native domain shapes and trusts the gateway's
//! context headers.

mod planner;
mod quiz;
mod retrieval;

use axum::Router;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware::service_context;

pub use planner::planner_router;
pub use quiz::quiz_router;
pub use retrieval::{EmbedRequest, EmbedResponse, retrieval_router};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: String,
    pub status: String,
}

impl ServiceStatus {
    fn new(service: &str, healthy: bool) -> Self {
        Self {
            service: service.to_string(),
            status: if healthy { "ok" } else { "degraded" }.to_string(),
        }
    }
}

/// Access log outermost, then the context middleware.
fn with_service_layers(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(service_context)),
    )
}
