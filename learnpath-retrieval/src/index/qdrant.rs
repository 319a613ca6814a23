//! Qdrant over its REST API.

use std::time::Duration;

use async_trait::async_trait;
use learnpath_core::model::Resource;
use learnpath_models::auth::ApiKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{Candidate, VectorIndex};
use crate::filters::SearchFilters;
use crate::{Result, RetrievalError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "resources".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct QdrantIndex {
    config: QdrantConfig,
    api_key: Option<ApiKey>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchReply {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl QdrantIndex {
    pub fn new(config: QdrantConfig, api_key: Option<ApiKey>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            config: QdrantConfig {
                url: config.url.trim_end_matches('/').to_string(),
                ..config
            },
            api_key,
            client,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.url, path);
        let mut request = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key.expose_secret());
        }
        request
    }
}

/// Qdrant filter: the tenant clause (caller OR global) is always the first `must` entry.
pub(crate) fn build_filter(filters: &SearchFilters) -> Value {
    let tenant = filters.tenant();
    let tenant_clause = if tenant.is_global() {
        json!({"key": "tenant_id", "match": {"value": tenant.as_str()}})
    } else {
        json!({"should": [
            {"key": "tenant_id", "match": {"value": "global"}},
            {"key": "tenant_id", "match": {"value": tenant.as_str()}},
        ]})
    };

    let facets = filters.facets();
    let mut must = vec![tenant_clause];
    if !facets.skills.is_empty() {
        must.push(json!({"key": "skills", "match": {"any": facets.skills}}));
    }
    if !facets.levels.is_empty() {
        must.push(json!({"key": "level", "match": {"any": facets.levels}}));
    }
    if !facets.media_types.is_empty() {
        must.push(json!({"key": "media_type", "match": {"any": facets.media_types}}));
    }
    if !facets.providers.is_empty() {
        must.push(json!({"key": "provider", "match": {"any": facets.providers}}));
    }
    if facets.min_duration.is_some() || facets.max_duration.is_some() {
        let mut range = Map::new();
        if let Some(min) = facets.min_duration {
            range.insert("gte".into(), json!(min));
        }
        if let Some(max) = facets.max_duration {
            range.insert("lte".into(), json!(max));
        }
        must.push(json!({"key": "duration_min", "range": range}));
    }
    json!({ "must": must })
}

/// Turn a point payload into a resource. Null fields fall back to defaults and the id
/// comes from `id`, then `resource_id`, then the point id.
fn payload_to_resource(point_id: &Value, mut payload: Map<String, Value>) -> Option<Resource> {
    payload.retain(|_, v| !v.is_null());
    if !payload.contains_key("id") {
        let id = payload.get("resource_id").cloned().unwrap_or_else(|| match point_id {
            Value::String(_) => point_id.clone(),
            other => Value::String(other.to_string()),
        });
        payload.insert("id".into(), id);
    }
    serde_json::from_value(Value::Object(payload)).ok()
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(
        &self,
        vector: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "filter": build_filter(filters),
        });
        let path = format!("/collections/{}/points/search", self.config.collection);
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::IndexUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RetrievalError::IndexUnavailable(format!(
                "qdrant returned status {}",
                response.status()
            )));
        }
        let reply: SearchReply = response
            .json()
            .await
            .map_err(|e| RetrievalError::IndexUnavailable(format!("invalid search reply: {e}")))?;

        let mut candidates = Vec::with_capacity(reply.result.len());
        for point in reply.result {
            let payload = point.payload.unwrap_or_default();
            match payload_to_resource(&point.id, payload) {
                Some(resource) => candidates.push(Candidate {
                    resource,
                    score: point.score,
                }),
                None => warn!(point_id = %point.id, "skipping point with unreadable payload"),
            }
        }
        debug!(hits = candidates.len(), "qdrant search complete");
        Ok(candidates)
    }

    async fn is_healthy(&self) -> bool {
        match self.request(reqwest::Method::GET, "/collections").send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "qdrant health check failed");
                false
            }
        }
    }
}
