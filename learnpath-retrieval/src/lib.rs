//! learnpath-retrieval - the retrieval pipeline
//!
//! Embeds a query, runs a tenant-scoped nearest-neighbour search, optionally reranks the
//! candidates with a cross-encoder, and returns scored resource cards. The tenant scope is
//! part of [`SearchFilters`] itself, so no search can be issued without one.

mod error;

pub mod embedder;
pub mod filters;
pub mod index;
pub mod pipeline;
pub mod reranker;

pub use embedder::{EmbedKind, Embedder, HashingEmbedder, ModelEmbedder};
pub use error::{Result, RetrievalError};
pub use filters::{Facets, SearchFilters, SearchRequest};
pub use index::{Candidate, MemoryIndex, QdrantConfig, QdrantIndex, VectorIndex};
pub use pipeline::{ResourceCard, RetrievalPipeline, SearchOutcome};
pub use reranker::{ModelReranker, Reranker};
