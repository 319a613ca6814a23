//! Cross-encoder reranking.

use std::sync::Arc;

use async_trait::async_trait;
use learnpath_models::ModelProvider;
use learnpath_models::providers::RerankRequest;

use crate::{Result, RetrievalError};

/// Character budget for one document sent to the cross-encoder.
pub const DEFAULT_MAX_DOCUMENT_CHARS: usize = 2_000;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// One relevance score per document, in input order.
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

pub struct ModelReranker {
    provider: Arc<dyn ModelProvider>,
    model: String,
    max_document_chars: usize,
}

impl ModelReranker {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_document_chars: DEFAULT_MAX_DOCUMENT_CHARS,
        }
    }

    pub fn with_max_document_chars(mut self, max: usize) -> Self {
        self.max_document_chars = max.max(1);
        self
    }
}

/// Cut a document to the budget on a char boundary. The query is never truncated.
fn truncate_document(doc: &str, max_chars: usize) -> String {
    match doc.char_indices().nth(max_chars) {
        Some((idx, _)) => doc[..idx].to_string(),
        None => doc.to_string(),
    }
}

#[async_trait]
impl Reranker for ModelReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let documents = documents
            .iter()
            .map(|d| truncate_document(d, self.max_document_chars))
            .collect::<Vec<_>>();
        let expected = documents.len();

        let response = self
            .provider
            .rerank(RerankRequest::new(&self.model, query, documents))
            .await
            .map_err(|e| RetrievalError::Rerank(e.to_string()))?;

        if response.scores.len() != expected {
            return Err(RetrievalError::Rerank(format!(
                "expected {expected} scores, got {}",
                response.scores.len()
            )));
        }
        Ok(response.scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnpath_models::providers::RerankResponse;
    use std::sync::Mutex;

    struct LengthScorer {
        seen: Mutex<Option<RerankRequest>>,
    }

    #[async_trait]
    impl ModelProvider for LengthScorer {
        fn name(&self) -> &str {
            "length"
        }

        async fn rerank(&self, request: RerankRequest) -> learnpath_models::Result<RerankResponse> {
            let scores = request.documents.iter().map(|d| d.len() as f32).collect();
            *self.seen.lock().unwrap() = Some(request);
            Ok(RerankResponse { scores })
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_document("héllo", 2), "hé");
        assert_eq!(truncate_document("hi", 10), "hi");
    }

    #[tokio::test]
    async fn only_documents_are_truncated() {
        let provider = Arc::new(LengthScorer {
            seen: Mutex::new(None),
        });
        let reranker = ModelReranker::new(provider.clone(), "ce").with_max_document_chars(4);
        let query = "a long query that stays intact";
        let scores = reranker
            .score(query, &["abcdefgh".into(), "ab".into()])
            .await
            .unwrap();
        assert_eq!(scores, vec![4.0, 2.0]);

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.query, query);
        assert_eq!(seen.documents, vec!["abcd", "ab"]);
    }
}
