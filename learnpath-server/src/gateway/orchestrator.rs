//! The gateway's calls into the downstream services.

use futures::future::join3;
use learnpath_core::RequestContext;
use learnpath_core::ids::{PlanId, UserId};
use learnpath_core::model::Difficulty;
use learnpath_planner::{PlanRequest, ReplanRequest};
use learnpath_quiz::{GenerateRequest, SubmitRequest};
use learnpath_retrieval::SearchRequest;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::adapters::{
    GatewaySearchBody, PlanListResponse, PlanResponse, QuizFailure, QuizView, SearchResponse,
    SubmitResponse,
};
use crate::client::{ClientError, DownstreamClient, IngestAccepted, IngestRequest, PlannerApi, QuizApi, RetrievalApi};
use crate::config::GatewayConfig;
use crate::error::ApiError;

const FULL_FLOW_QUESTIONS: u32 = 3;
const FULL_FLOW_SEARCH_TOP_K: u32 = 10;

/// `POST /api/plan` body: a plan request plus optional quiz generation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanBody {
    #[serde(flatten)]
    pub plan: PlanRequest,
    #[serde(default)]
    pub generate_quiz: bool,
    #[serde(default)]
    pub num_questions: Option<u32>,
    #[serde(default)]
    pub quiz_difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub url: String,
    pub reachable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicesHealth {
    pub retrieval: ServiceHealth,
    pub planner: ServiceHealth,
    pub quiz: ServiceHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub services: ServicesHealth,
}

pub struct Orchestrator {
    retrieval: RetrievalApi,
    planner: PlannerApi,
    quiz: QuizApi,
}

impl Orchestrator {
    pub fn new(retrieval: RetrievalApi, planner: PlannerApi, quiz: QuizApi) -> Self {
        Self {
            retrieval,
            planner,
            quiz,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        let client = |service, url: &str| DownstreamClient::new(service, url, config.retry.clone());
        Self::new(
            RetrievalApi::new(client("retrieval", &config.retrieval_url)),
            PlannerApi::new(client("planner", &config.planner_url)),
            QuizApi::new(client("quiz", &config.quiz_url)),
        )
    }

    pub async fn search(&self, ctx: &RequestContext, body: GatewaySearchBody) -> Result<SearchResponse, ApiError> {
        let request = body.into_request(&ctx.tenant);
        Ok(self.retrieval.search(ctx, &request).await?.into())
    }

    /// Search, then plan, then (when asked and there is something to quiz on) a quiz over
    /// the plan's resources. The search only checks that retrieval can serve the goal.
    /// A quiz failure is reported next to the stored plan.
    #[instrument(skip(self, ctx, body), fields(request_id = %ctx.request_id, tenant_id = %ctx.tenant))]
    pub async fn full_flow(&self, ctx: &RequestContext, body: CreatePlanBody) -> Result<PlanResponse, ApiError> {
        let CreatePlanBody {
            mut plan,
            generate_quiz,
            num_questions,
            quiz_difficulty,
        } = body;
        // Ownership comes from the token, never from the body.
        plan.user_id = None;

        let probe = SearchRequest::new(plan.goal.clone()).with_top_k(FULL_FLOW_SEARCH_TOP_K);
        match self.retrieval.search(ctx, &probe).await {
            Ok(outcome) => info!(results = outcome.cards.len(), "goal search succeeded"),
            Err(e) => warn!(error = %e, "goal search failed; planning anyway"),
        }

        let plan = self.planner.create_plan(ctx, &plan).await?;
        let resource_ids = plan.resource_ids();
        let plan_id = plan.id;
        let mut response = PlanResponse::from(plan);

        if !generate_quiz {
            return Ok(response);
        }
        if resource_ids.is_empty() {
            info!(%plan_id, "plan has no resources; skipping quiz");
            return Ok(response);
        }

        let request = GenerateRequest {
            resource_ids,
            num_questions: Some(num_questions.unwrap_or(FULL_FLOW_QUESTIONS)),
            difficulty: Some(quiz_difficulty.unwrap_or(Difficulty::Medium)),
            title: Some(format!("Quiz: {}", response.goal)),
        };
        match self.quiz.generate(ctx, &request).await {
            Ok(quiz) => response.quiz = Some(QuizView::from(quiz)),
            Err(e) => {
                warn!(%plan_id, error = %e, "quiz generation failed; returning plan without quiz");
                response.quiz_error = Some(quiz_failure(e));
            }
        }
        Ok(response)
    }

    pub async fn get_plan(&self, ctx: &RequestContext, plan_id: PlanId) -> Result<PlanResponse, ApiError> {
        Ok(self.planner.get_plan(ctx, plan_id).await?.into())
    }

    pub async fn replan(
        &self,
        ctx: &RequestContext,
        plan_id: PlanId,
        request: &ReplanRequest,
    ) -> Result<PlanResponse, ApiError> {
        Ok(self.planner.replan(ctx, plan_id, request).await?.into())
    }

    pub async fn list_plans(&self, ctx: &RequestContext, user: &UserId) -> Result<PlanListResponse, ApiError> {
        if ctx.user_id.as_ref().is_some_and(|caller| caller != user) {
            return Err(ApiError::new(
                learnpath_core::ErrorCode::Unauthorized,
                "cannot list another user's plans",
            ));
        }
        Ok(self.planner.list_plans(ctx, user).await?.into())
    }

    pub async fn generate_quiz(&self, ctx: &RequestContext, request: &GenerateRequest) -> Result<QuizView, ApiError> {
        Ok(self.quiz.generate(ctx, request).await?.into())
    }

    pub async fn submit_quiz(&self, ctx: &RequestContext, request: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        Ok(self.quiz.submit(ctx, request).await?.into())
    }

    pub async fn ingest(&self, ctx: &RequestContext, request: &IngestRequest) -> Result<IngestAccepted, ApiError> {
        Ok(self.retrieval.ingest(ctx, request).await?)
    }

    /// Probe every downstream concurrently.
    pub async fn health(&self) -> HealthResponse {
        let (retrieval, planner, quiz) = join3(
            probe(self.retrieval.client()),
            probe(self.planner.client()),
            probe(self.quiz.client()),
        )
        .await;
        let status = if retrieval.reachable && planner.reachable && quiz.reachable {
            "ok"
        } else {
            "degraded"
        };
        HealthResponse {
            status: status.to_string(),
            services: ServicesHealth {
                retrieval,
                planner,
                quiz,
            },
        }
    }
}

async fn probe(client: &DownstreamClient) -> ServiceHealth {
    ServiceHealth {
        url: client.base_url().to_string(),
        reachable: client.is_reachable().await,
    }
}

fn quiz_failure(err: ClientError) -> QuizFailure {
    QuizFailure {
        code: err.code(),
        message: err.public_message(),
    }
}
