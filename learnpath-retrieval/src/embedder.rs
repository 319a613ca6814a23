//! Text embedding for queries and documents.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use learnpath_models::ModelProvider;
use learnpath_models::providers::EmbedRequest;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, RetrievalError};

/// Instruction-tuned models embed queries and passages with different prefixes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    Query,
    #[default]
    Passage,
}

impl EmbedKind {
    pub fn prefix(self) -> &'static str {
        match self {
            EmbedKind::Query => "query: ",
            EmbedKind::Passage => "passage: ",
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per text, in input order.
    async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<Vec<Vec<f32>>>;

    fn name(&self) -> &str;
}

/// Embeds through a hosted model provider.
pub struct ModelEmbedder {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl ModelEmbedder {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for ModelEmbedder {
    async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<Vec<Vec<f32>>> {
        let inputs = texts
            .iter()
            .map(|t| format!("{}{}", kind.prefix(), t))
            .collect();
        let response = self
            .provider
            .embed(EmbedRequest::new(&self.model, inputs))
            .await
            .map_err(|e| RetrievalError::EmbeddingUnavailable(e.to_string()))?;

        if response.embeddings.len() != texts.len() {
            return Err(RetrievalError::EmbeddingUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        debug!(count = texts.len(), model = %self.model, "embedded texts");
        Ok(response.embeddings)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Feature-hashing embedder for offline runs and tests.
///
/// Terms are hashed (FNV-1a) into fixed buckets weighted by frequency and L2-normalised.
/// Texts sharing words land close together, which is enough for keyword-level recall.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % dims as u64) as usize
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut counts: HashMap<String, f32> = HashMap::new();
        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() >= 2)
        {
            *counts.entry(term.to_lowercase()).or_default() += 1.0;
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for (term, count) in &counts {
            vector[Self::bucket(term, self.dimensions)] += count;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String], _kind: EmbedKind) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnpath_models::providers::EmbedResponse;
    use std::sync::Mutex;

    struct RecordingProvider {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ModelProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn embed(&self, request: EmbedRequest) -> learnpath_models::Result<EmbedResponse> {
            if self.fail {
                return Err(learnpath_models::Error::ProviderApi("down".into()));
            }
            self.seen.lock().unwrap().extend(request.texts.iter().cloned());
            Ok(EmbedResponse {
                embeddings: request.texts.iter().map(|_| vec![1.0, 0.0]).collect(),
            })
        }
    }

    #[tokio::test]
    async fn model_embedder_prefixes_by_kind() {
        let provider = Arc::new(RecordingProvider {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let embedder = ModelEmbedder::new(provider.clone(), "e5");
        embedder.embed(&["kafka".into()], EmbedKind::Query).await.unwrap();
        embedder.embed(&["doc".into()], EmbedKind::Passage).await.unwrap();

        let seen = provider.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["query: kafka", "passage: doc"]);
    }

    #[tokio::test]
    async fn provider_failure_is_unavailable() {
        let embedder = ModelEmbedder::new(
            Arc::new(RecordingProvider {
                seen: Mutex::new(Vec::new()),
                fail: true,
            }),
            "e5",
        );
        let err = embedder.embed(&["q".into()], EmbedKind::Query).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingUnavailable(_)));
    }

    #[test]
    fn hashing_vectors_are_normalised_and_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.vector("kafka partitioning basics");
        let b = embedder.vector("kafka partitioning basics");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(embedder.vector("").iter().all(|&x| x == 0.0));
    }
}
