use learnpath_core::RequestContext;
use learnpath_core::ids::{PlanId, UserId};
use learnpath_core::model::{Plan, PlanSummary};
use learnpath_planner::{PlanRequest, ReplanRequest};

use super::{ClientError, DownstreamClient};

/// Planner service over HTTP.
#[derive(Clone)]
pub struct PlannerApi {
    client: DownstreamClient,
}

impl PlannerApi {
    pub fn new(client: DownstreamClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DownstreamClient {
        &self.client
    }

    pub async fn create_plan(&self, ctx: &RequestContext, request: &PlanRequest) -> Result<Plan, ClientError> {
        self.client.post(ctx, "/plan", request).await
    }

    pub async fn get_plan(&self, ctx: &RequestContext, plan_id: PlanId) -> Result<Plan, ClientError> {
        self.client.get(ctx, &format!("/plan/{plan_id}")).await
    }

    pub async fn replan(
        &self,
        ctx: &RequestContext,
        plan_id: PlanId,
        request: &ReplanRequest,
    ) -> Result<Plan, ClientError> {
        self.client
            .post(ctx, &format!("/plan/{plan_id}/replan"), request)
            .await
    }

    pub async fn list_plans(&self, ctx: &RequestContext, user: &UserId) -> Result<Vec<PlanSummary>, ClientError> {
        self.client.get(ctx, &format!("/user/{user}/plans")).await
    }
}
