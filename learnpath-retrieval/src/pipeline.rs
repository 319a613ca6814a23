//! Embed, search, rerank.

use std::cmp::Ordering;
use std::sync::Arc;

use learnpath_core::context::RequestContext;
use learnpath_core::model::Resource;
use learnpath_core::store::IngestQueue;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use crate::embedder::{EmbedKind, Embedder};
use crate::filters::{SearchFilters, SearchRequest};
use crate::index::{Candidate, VectorIndex};
use crate::reranker::Reranker;
use crate::{Result, RetrievalError};

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCard {
    pub resource: Resource,
    pub score: f32,
    pub why_relevant: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub cards: Vec<ResourceCard>,
    /// False when reranking was skipped or the reranker failed.
    pub reranked: bool,
}

pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    reranker: Option<Arc<dyn Reranker>>,
    ingest: Option<Arc<dyn IngestQueue>>,
}

impl RetrievalPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            reranker: None,
            ingest: None,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_ingest_queue(mut self, queue: Arc<dyn IngestQueue>) -> Self {
        self.ingest = Some(queue);
        self
    }

    #[instrument(
        skip(self, ctx, request),
        fields(request_id = %ctx.request_id, tenant_id = %ctx.tenant, top_k = request.top_k)
    )]
    pub async fn search(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchOutcome> {
        request.validate()?;
        let filters = SearchFilters::new(ctx.tenant.clone(), request.filters.clone());

        let vector = self
            .embedder
            .embed(std::slice::from_ref(&request.query), EmbedKind::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingUnavailable("no embedding returned".into()))?;

        let mut candidates = self
            .index
            .search(&vector, &filters, request.top_k as usize)
            .await?;

        let before = candidates.len();
        candidates.retain(|c| ctx.tenant.can_see(&c.resource.tenant));
        if candidates.len() != before {
            warn!(
                dropped = before - candidates.len(),
                "index returned resources outside the caller's tenant scope"
            );
        }
        rank(&mut candidates);

        let mut reranked = false;
        if request.rerank && !candidates.is_empty() {
            match &self.reranker {
                Some(reranker) => {
                    let documents: Vec<String> =
                        candidates.iter().map(|c| c.resource.document_text()).collect();
                    match reranker.score(&request.query, &documents).await {
                        Ok(scores) => {
                            for (candidate, score) in candidates.iter_mut().zip(scores) {
                                candidate.score = score;
                            }
                            rank(&mut candidates);
                            candidates.truncate(request.rerank_top_n as usize);
                            reranked = true;
                        }
                        Err(e) => warn!(error = %e, "reranker unavailable, keeping vector order"),
                    }
                }
                None => warn!("rerank requested but no reranker is configured"),
            }
        }

        let cards: Vec<ResourceCard> = candidates
            .into_iter()
            .map(|c| {
                let why_relevant = why_relevant(&c, &filters);
                ResourceCard {
                    resource: c.resource,
                    score: c.score,
                    why_relevant,
                }
            })
            .collect();
        info!(results = cards.len(), reranked, "search complete");
        Ok(SearchOutcome { cards, reranked })
    }

    /// Embed texts for the ingestion process.
    pub async fn embed(&self, texts: &[String], kind: EmbedKind) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(RetrievalError::InvalidRequest("texts must not be empty".into()));
        }
        self.embedder.embed(texts, kind).await
    }

    /// Validate and queue URLs for the external ingestion process.
    #[instrument(skip(self, ctx, urls), fields(request_id = %ctx.request_id, tenant_id = %ctx.tenant))]
    pub async fn ingest(&self, ctx: &RequestContext, urls: &[String]) -> Result<usize> {
        if urls.is_empty() {
            return Err(RetrievalError::InvalidRequest("urls must not be empty".into()));
        }
        for raw in urls {
            let parsed = Url::parse(raw)
                .map_err(|e| RetrievalError::InvalidRequest(format!("invalid url {raw}: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(RetrievalError::InvalidRequest(format!(
                    "unsupported url scheme: {raw}"
                )));
            }
        }
        let queue = self.ingest.as_ref().ok_or(RetrievalError::IngestUnavailable)?;
        let accepted = queue.enqueue(&ctx.tenant, urls).await?;
        info!(accepted, "queued urls for ingestion");
        Ok(accepted)
    }

    pub async fn is_healthy(&self) -> bool {
        self.index.is_healthy().await
    }
}

/// Score descending, then newer first (undated last), then id ascending.
fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.resource.updated_at.cmp(&a.resource.updated_at))
            .then_with(|| a.resource.id.cmp(&b.resource.id))
    });
}

fn why_relevant(candidate: &Candidate, filters: &SearchFilters) -> String {
    let resource = &candidate.resource;
    let mut parts = Vec::new();

    let matched: Vec<&str> = filters
        .facets()
        .skills
        .iter()
        .filter(|s| resource.teaches(s))
        .map(|s| s.as_str())
        .collect();
    if !matched.is_empty() {
        parts.push(format!("covers {}", matched.join(", ")));
    }
    if let Some(level) = resource.level {
        parts.push(format!("{level} level"));
    }
    if resource.duration_min > 0 {
        parts.push(format!("{} min", resource.duration_min));
    }

    let relevance = match candidate.score.partial_cmp(&0.5) {
        Some(Ordering::Greater) => "strong match",
        _ => "related",
    };
    if parts.is_empty() {
        format!("{relevance} for the query")
    } else {
        format!("{relevance}: {}", parts.join("; "))
    }
}
