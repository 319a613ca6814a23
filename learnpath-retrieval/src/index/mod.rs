//! Nearest-neighbour search backends.

mod memory;
mod qdrant;

use async_trait::async_trait;
use learnpath_core::model::Resource;

pub use memory::MemoryIndex;
pub use qdrant::{QdrantConfig, QdrantIndex};

use crate::Result;
use crate::filters::SearchFilters;

/// A resource and its similarity to the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub resource: Resource,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `limit` nearest resources that satisfy `filters`, including its tenant scope.
    async fn search(
        &self,
        vector: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Candidate>>;

    async fn is_healthy(&self) -> bool;
}
