//! DeepInfra inference API provider for embeddings and cross-encoder reranking.
//!
//! Both operations post to `{base_url}/inference/{model}`:
//! embeddings send `{"inputs": [...]}` and receive `{"embeddings": [[...]]}`,
//! reranking sends `{"queries": [q], "documents": [...]}` and receives `{"scores": [...]}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbedRequest, EmbedResponse, ModelProvider, RerankRequest, RerankResponse, api_error};
use crate::auth::ApiKey;
use crate::{Error, Result};

/// Default DeepInfra API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.deepinfra.com/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct EmbedBody<'a> {
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedReply {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct RerankBody<'a> {
    queries: [&'a str; 1],
    documents: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RerankReply {
    scores: Vec<f32>,
}

pub struct DeepInfraProvider {
    base_url: String,
    api_key: Option<ApiKey>,
    client: reqwest::Client,
}

impl DeepInfraProvider {
    pub fn new(api_key: Option<ApiKey>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<ApiKey>) -> Self {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, api_key: Option<ApiKey>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized>(&self, model: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}/inference/{}", self.base_url, model);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(api_error(self.name(), response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelProvider for DeepInfraProvider {
    fn name(&self) -> &str {
        "deepinfra"
    }

    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse> {
        debug!(model = %request.model, count = request.texts.len(), "embedding texts");
        let response = self
            .post(&request.model, &EmbedBody {
                inputs: &request.texts,
            })
            .await?;
        let reply: EmbedReply = response
            .json()
            .await
            .map_err(|e| Error::ProviderApi(format!("malformed embedding response: {e}")))?;

        if reply.embeddings.len() != request.texts.len() {
            return Err(Error::ProviderApi(format!(
                "expected {} embeddings, got {}",
                request.texts.len(),
                reply.embeddings.len()
            )));
        }
        Ok(EmbedResponse {
            embeddings: reply.embeddings,
        })
    }

    async fn rerank(&self, request: RerankRequest) -> Result<RerankResponse> {
        debug!(model = %request.model, count = request.documents.len(), "reranking documents");
        let response = self
            .post(&request.model, &RerankBody {
                queries: [request.query.as_str()],
                documents: &request.documents,
            })
            .await?;
        let reply: RerankReply = response
            .json()
            .await
            .map_err(|e| Error::ProviderApi(format!("malformed rerank response: {e}")))?;

        if reply.scores.len() != request.documents.len() {
            return Err(Error::ProviderApi(format!(
                "expected {} scores, got {}",
                request.documents.len(),
                reply.scores.len()
            )));
        }
        Ok(RerankResponse {
            scores: reply.scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn embed_posts_inputs_with_bearer_key() {
        let router = Router::new().route(
            "/inference/intfloat/e5-base-v2",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer k");
                let n = body["inputs"].as_array().unwrap().len();
                Json(json!({"embeddings": vec![vec![0.5_f32, 0.5]; n]}))
            }),
        );
        let base = spawn(router).await;
        let provider = DeepInfraProvider::with_base_url(base, Some(ApiKey::new("k")));

        let response = provider
            .embed(EmbedRequest::new(
                "intfloat/e5-base-v2",
                vec!["query: a".into(), "query: b".into()],
            ))
            .await
            .unwrap();
        assert_eq!(response.embeddings.len(), 2);
    }

    #[tokio::test]
    async fn rerank_returns_scores_in_order() {
        let router = Router::new().route(
            "/inference/reranker",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["queries"][0], "kafka");
                Json(json!({"scores": [0.1, 0.9]}))
            }),
        );
        let base = spawn(router).await;
        let provider = DeepInfraProvider::with_base_url(base, None);

        let response = provider
            .rerank(RerankRequest::new("reranker", "kafka", vec!["a".into(), "b".into()]))
            .await
            .unwrap();
        assert_eq!(response.scores, vec![0.1, 0.9]);
    }

    #[tokio::test]
    async fn server_error_maps_to_provider_api() {
        let router = Router::new().route(
            "/inference/m",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base = spawn(router).await;
        let provider = DeepInfraProvider::with_base_url(base, None);

        let err = provider
            .embed(EmbedRequest::new("m", vec!["x".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderApi(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_request_error() {
        let provider = DeepInfraProvider::with_base_url("http://127.0.0.1:1", None);
        let err = provider
            .embed(EmbedRequest::new("m", vec!["x".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }
}
