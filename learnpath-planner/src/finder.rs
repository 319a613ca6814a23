use async_trait::async_trait;
use learnpath_core::context::RequestContext;
use learnpath_retrieval::{RetrievalError, RetrievalPipeline, SearchOutcome, SearchRequest};

/// Where the planner sources resources from: the pipeline in-process, or a retrieval
/// service over the network.
#[async_trait]
pub trait ResourceFinder: Send + Sync {
    async fn find(
        &self,
        ctx: &RequestContext,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, RetrievalError>;
}

#[async_trait]
impl ResourceFinder for RetrievalPipeline {
    async fn find(
        &self,
        ctx: &RequestContext,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, RetrievalError> {
        self.search(ctx, request).await
    }
}
