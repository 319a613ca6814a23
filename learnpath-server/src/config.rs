//! Listener and downstream configuration.

use serde::{Deserialize, Serialize};

use crate::client::RetryPolicy;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:8000")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where the gateway finds its downstream services and how long it waits for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub retrieval_url: String,
    pub planner_url: String,
    pub quiz_url: String,
    /// Deadline for a whole inbound request, downstream retries included.
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            retrieval_url: "http://localhost:8001".to_string(),
            planner_url: "http://localhost:8002".to_string(),
            quiz_url: "http://localhost:8003".to_string(),
            request_timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}
