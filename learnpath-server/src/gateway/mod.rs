//! The public gateway: authenticated `/api` routes over the downstream services.

mod adapters;
mod orchestrator;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use learnpath_core::ids::{PlanId, UserId};
use learnpath_planner::ReplanRequest;
use learnpath_quiz::{GenerateRequest, SubmitRequest};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::{IngestAccepted, IngestRequest};
use crate::error::{ApiError, parse_id};
use crate::middleware::{AuthLayer, Ctx, gateway_context};

pub use adapters::{
    GatewaySearchBody, Milestone, MilestoneResource, PlanListItem, PlanListResponse, PlanResponse,
    QuestionView, QuizFailure, QuizView, SearchResponse, SearchResult, SubmitResponse,
};
pub use orchestrator::{CreatePlanBody, HealthResponse, Orchestrator, ServiceHealth, ServicesHealth};

type Gateway = State<Arc<Orchestrator>>;

/// Create the gateway router. `/health` is open; everything under `/api` is authenticated.
pub fn gateway_router(orchestrator: Arc<Orchestrator>, auth: AuthLayer) -> Router {
    let api = Router::new()
        .route("/api/search", post(search))
        .route("/api/plan", post(create_plan))
        .route("/api/plan/:id", get(get_plan))
        .route("/api/plan/:id/replan", post(replan))
        .route("/api/plan/user/:user_id/plans", get(list_plans))
        .route("/api/quiz/generate", post(generate_quiz))
        .route("/api/quiz/submit", post(submit_quiz))
        .route("/api/ingest/resources", post(ingest))
        .layer(axum::middleware::from_fn(gateway_context))
        .layer(Extension(auth));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}

async fn search(
    State(gateway): Gateway,
    Ctx(ctx): Ctx,
    body: Result<Json<GatewaySearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(body) = body?;
    Ok(Json(gateway.search(&ctx, body).await?))
}

async fn create_plan(
    State(gateway): Gateway,
    Ctx(ctx): Ctx,
    body: Result<Json<CreatePlanBody>, JsonRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let Json(body) = body?;
    Ok(Json(gateway.full_flow(&ctx, body).await?))
}

async fn get_plan(
    State(gateway): Gateway,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
) -> Result<Json<PlanResponse>, ApiError> {
    let plan_id: PlanId = parse_id(&id, "plan")?;
    Ok(Json(gateway.get_plan(&ctx, plan_id).await?))
}

async fn replan(
    State(gateway): Gateway,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
    body: Result<Json<ReplanRequest>, JsonRejection>,
) -> Result<Json<PlanResponse>, ApiError> {
    let plan_id: PlanId = parse_id(&id, "plan")?;
    let Json(body) = body?;
    Ok(Json(gateway.replan(&ctx, plan_id, &body).await?))
}

async fn list_plans(
    State(gateway): Gateway,
    Ctx(ctx): Ctx,
    Path(user_id): Path<String>,
) -> Result<Json<PlanListResponse>, ApiError> {
    Ok(Json(gateway.list_plans(&ctx, &UserId::new(user_id)).await?))
}

async fn generate_quiz(
    State(gateway): Gateway,
    Ctx(ctx): Ctx,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<QuizView>, ApiError> {
    let Json(body) = body?;
    Ok(Json(gateway.generate_quiz(&ctx, &body).await?))
}

async fn submit_quiz(
    State(gateway): Gateway,
    Ctx(ctx): Ctx,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(body) = body?;
    Ok(Json(gateway.submit_quiz(&ctx, &body).await?))
}

async fn ingest(
    State(gateway): Gateway,
    Ctx(ctx): Ctx,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestAccepted>, ApiError> {
    let Json(body) = body?;
    Ok(Json(gateway.ingest(&ctx, &body).await?))
}

async fn health(State(gateway): Gateway) -> Json<HealthResponse> {
    Json(gateway.health().await)
}
