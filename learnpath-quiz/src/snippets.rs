//! Cached resource content, keyed by the resource's content pointer.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use learnpath_core::ids::ResourceId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{QuizError, Result};

/// Content of one resource that questions may cite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub resource_id: ResourceId,
    pub title: String,
    pub content: String,
}

#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Content stored under `pointer`, or `None` when nothing is stored there.
    async fn fetch(&self, pointer: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetStoreConfig {
    /// Base URL of the object store bucket, e.g. an S3 virtual-hosted bucket endpoint.
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for SnippetStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000/learnpath-snippets".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Reads objects with plain `GET {url}/{pointer}`.
pub struct HttpSnippetStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSnippetStore {
    pub fn new(config: &SnippetStoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl SnippetStore for HttpSnippetStore {
    async fn fetch(&self, pointer: &str) -> Result<Option<String>> {
        let url = format!("{}/{}", self.base_url, pointer.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QuizError::SnippetUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(pointer, "snippet missing");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(QuizError::SnippetUnavailable(format!(
                "snippet store returned {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| QuizError::SnippetUnavailable(e.to_string()))?;
        Ok(Some(body))
    }
}

/// In-process snippets for tests and seeded local setups.
#[derive(Default)]
pub struct MemorySnippetStore {
    snippets: RwLock<HashMap<String, String>>,
}

impl MemorySnippetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, pointer: impl Into<String>, content: impl Into<String>) {
        self.snippets
            .write()
            .await
            .insert(pointer.into(), content.into());
    }
}

#[async_trait]
impl SnippetStore for MemorySnippetStore {
    async fn fetch(&self, pointer: &str) -> Result<Option<String>> {
        Ok(self.snippets.read().await.get(pointer).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn http_store_reads_objects_and_maps_missing_to_none() {
        let router = Router::new()
            .route("/bucket/kafka/partitions.txt", get(|| async { "Partitions split a topic." }))
            .route("/bucket/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let base = spawn(router).await;
        let store = HttpSnippetStore::new(&SnippetStoreConfig {
            url: format!("{base}/bucket/"),
            timeout_secs: 5,
        });

        let content = store.fetch("kafka/partitions.txt").await.unwrap();
        assert_eq!(content.as_deref(), Some("Partitions split a topic."));
        assert!(store.fetch("nope").await.unwrap().is_none());
        assert!(matches!(
            store.fetch("broken").await,
            Err(QuizError::SnippetUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemorySnippetStore::new();
        store.insert("k", "content").await;
        assert_eq!(store.fetch("k").await.unwrap().as_deref(), Some("content"));
        assert!(store.fetch("other").await.unwrap().is_none());
    }
}
