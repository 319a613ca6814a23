//! Model provider trait and implementations.
//!
//! The [`ModelProvider`] trait is the single seam between the services and hosted models:
//! chat completions feed quiz generation, embeddings and reranking feed retrieval.

mod deepinfra;
mod openai;
mod types;

use async_trait::async_trait;

pub use deepinfra::DeepInfraProvider;
pub use openai::OpenAiCompatProvider;
pub use types::*;

use crate::{Error, Result};

/// Trait for hosted model providers.
///
/// Only [`name`](ModelProvider::name) is required; each operation defaults to
/// [`Error::Unsupported`] so a provider implements just what its API offers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the provider name (e.g., "deepinfra", "openrouter").
    fn name(&self) -> &str;

    /// Perform a chat completion request.
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Err(Error::Unsupported {
            provider: self.name().to_string(),
            operation: "chat",
        })
    }

    /// Generate text embeddings.
    async fn embed(&self, _request: EmbedRequest) -> Result<EmbedResponse> {
        Err(Error::Unsupported {
            provider: self.name().to_string(),
            operation: "embeddings",
        })
    }

    /// Score documents against a query.
    async fn rerank(&self, _request: RerankRequest) -> Result<RerankResponse> {
        Err(Error::Unsupported {
            provider: self.name().to_string(),
            operation: "rerank",
        })
    }
}

/// Map a non-success HTTP response into [`Error::ProviderApi`], keeping only a short
/// prefix of the body.
pub(crate) async fn api_error(provider: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Error::ProviderApi(format!("{provider} returned status {status}: {snippet}"))
}
