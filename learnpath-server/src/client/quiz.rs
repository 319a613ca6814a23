use learnpath_core::RequestContext;
use learnpath_core::model::{Quiz, QuizAttempt};
use learnpath_quiz::{GenerateRequest, SubmitRequest};

use super::{ClientError, DownstreamClient};

/// Quiz service over HTTP.
#[derive(Clone)]
pub struct QuizApi {
    client: DownstreamClient,
}

impl QuizApi {
    pub fn new(client: DownstreamClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DownstreamClient {
        &self.client
    }

    pub async fn generate(&self, ctx: &RequestContext, request: &GenerateRequest) -> Result<Quiz, ClientError> {
        self.client.post(ctx, "/generate", request).await
    }

    pub async fn submit(&self, ctx: &RequestContext, request: &SubmitRequest) -> Result<QuizAttempt, ClientError> {
        self.client.post(ctx, "/submit", request).await
    }
}
