//! learnpath-server - HTTP surfaces for learnpath
//!
//! One binary can serve any of four roles: the public gateway (authenticated `/api`
//! routes that orchestrate the others), or one of the internal retrieval, planner and
//! quiz services. The gateway reaches the services over HTTP with bounded retries.

pub mod client;
mod config;
mod error;
pub mod gateway;
pub mod middleware;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use learnpath_core::AuthConfig;
use tokio::net::TcpListener;

pub use config::{GatewayConfig, ServerConfig};
pub use error::{ApiError, ServerError};
pub use gateway::{Orchestrator, gateway_router};
pub use middleware::AuthLayer;
pub use services::{planner_router, quiz_router, retrieval_router};

/// A router bound to a listen address.
pub struct LearnpathServer {
    name: &'static str,
    config: ServerConfig,
    router: Router,
}

impl LearnpathServer {
    pub fn new(name: &'static str, config: ServerConfig, router: Router) -> Self {
        Self {
            name,
            config,
            router,
        }
    }

    /// The public gateway over the downstream services named in `gateway`.
    pub fn gateway(config: ServerConfig, gateway: &GatewayConfig, auth: AuthConfig) -> Self {
        let auth = AuthLayer::new(auth, Duration::from_secs(gateway.request_timeout_secs));
        let orchestrator = Arc::new(Orchestrator::from_config(gateway));
        Self::new("gateway", config, gateway_router(orchestrator, auth))
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;
        self.run_with_listener(listener).await
    }

    /// Run the server on an already-bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.config.addr());
        tracing::info!(service = self.name, %addr, "learnpath server listening");
        axum::serve(listener, self.router)
            .await
            .map_err(|e| ServerError::Internal(format!("{} server error: {e}", self.name)))
    }
}
