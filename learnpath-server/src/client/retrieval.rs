use async_trait::async_trait;
use learnpath_core::RequestContext;
use learnpath_planner::ResourceFinder;
use learnpath_retrieval::{RetrievalError, SearchOutcome, SearchRequest};
use serde::{Deserialize, Serialize};

use super::{ClientError, DownstreamClient};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestAccepted {
    pub accepted: usize,
}

/// Retrieval service over HTTP.
#[derive(Clone)]
pub struct RetrievalApi {
    client: DownstreamClient,
}

impl RetrievalApi {
    pub fn new(client: DownstreamClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DownstreamClient {
        &self.client
    }

    pub async fn search(&self, ctx: &RequestContext, request: &SearchRequest) -> Result<SearchOutcome, ClientError> {
        self.client.post(ctx, "/search", request).await
    }

    pub async fn ingest(&self, ctx: &RequestContext, request: &IngestRequest) -> Result<IngestAccepted, ClientError> {
        self.client.post(ctx, "/ingest/resources", request).await
    }
}

/// Lets a planner service source resources from a remote retrieval service.
#[async_trait]
impl ResourceFinder for RetrievalApi {
    async fn find(
        &self,
        ctx: &RequestContext,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, RetrievalError> {
        self.search(ctx, request)
            .await
            .map_err(|e| RetrievalError::Remote {
                code: e.code(),
                message: e.public_message(),
            })
    }
}
