use async_trait::async_trait;
use learnpath_core::model::Resource;
use learnpath_core::store::ResourceCatalog;
use tokio::sync::RwLock;
use tracing::info;

use super::{Candidate, VectorIndex};
use crate::Result;
use crate::embedder::{EmbedKind, Embedder};
use crate::filters::SearchFilters;

const EMBED_BATCH: usize = 32;

/// Brute-force cosine index held in memory.
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<Vec<(Resource, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed every catalog resource as a passage and index it.
    pub async fn from_catalog(catalog: &dyn ResourceCatalog, embedder: &dyn Embedder) -> Result<Self> {
        let index = Self::new();
        let resources = catalog.list_resources().await?;
        for chunk in resources.chunks(EMBED_BATCH) {
            let texts: Vec<String> = chunk.iter().map(Resource::document_text).collect();
            let vectors = embedder.embed(&texts, EmbedKind::Passage).await?;
            for (resource, vector) in chunk.iter().zip(vectors) {
                index.insert(resource.clone(), vector).await;
            }
        }
        info!(resources = index.len().await, embedder = embedder.name(), "memory index loaded");
        Ok(index)
    }

    /// Insert or replace the entry for a resource id.
    pub async fn insert(&self, resource: Resource, vector: Vec<f32>) {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|(r, _)| r.id == resource.id) {
            Some(entry) => *entry = (resource, vector),
            None => entries.push((resource, vector)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(
        &self,
        vector: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let entries = self.entries.read().await;
        let mut hits: Vec<Candidate> = entries
            .iter()
            .filter(|(resource, _)| filters.matches(resource))
            .map(|(resource, v)| Candidate {
                resource: resource.clone(),
                score: cosine(vector, v),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnpath_core::context::TenantId;

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_applies_tenant_and_limit() {
        let index = MemoryIndex::new();
        index
            .insert(Resource::new("a", "A", "u").with_tenant(TenantId::new("acme")), vec![1.0, 0.0])
            .await;
        index.insert(Resource::new("g", "G", "u"), vec![0.9, 0.1]).await;
        index
            .insert(
                Resource::new("o", "O", "u").with_tenant(TenantId::new("other-tenant")),
                vec![1.0, 0.0],
            )
            .await;

        let filters = SearchFilters::for_tenant(TenantId::new("acme"));
        let hits = index.search(&[1.0, 0.0], &filters, 10).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|c| c.resource.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "g"]);

        let hits = index.search(&[1.0, 0.0], &filters, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn insert_replaces_existing_id() {
        let index = MemoryIndex::new();
        index.insert(Resource::new("a", "Old", "u"), vec![1.0]).await;
        index.insert(Resource::new("a", "New", "u"), vec![1.0]).await;
        assert_eq!(index.len().await, 1);
    }
}
