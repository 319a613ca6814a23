use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use learnpath_core::ids::{PlanId, UserId};
use learnpath_core::model::{Plan, PlanSummary, PrerequisiteEdge, Progress};
use learnpath_planner::{PlanRequest, Planner, ReplanRequest};

use super::{ServiceStatus, with_service_layers};
use crate::error::{ApiError, parse_id};
use crate::middleware::Ctx;

type PlannerState = State<Arc<Planner>>;

pub fn planner_router(planner: Arc<Planner>) -> Router {
    let router = Router::new()
        .route("/plan", post(create_plan))
        .route("/plan/:id", get(get_plan))
        .route("/plan/:id/replan", post(replan))
        .route("/plan/:id/progress", get(progress))
        .route("/user/:id/plans", get(list_plans))
        .route("/skills/prerequisites", post(add_prerequisite))
        .route("/health", get(health))
        .with_state(planner);
    with_service_layers(router)
}

async fn create_plan(
    State(planner): PlannerState,
    Ctx(ctx): Ctx,
    body: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<Plan>, ApiError> {
    let Json(request) = body?;
    Ok(Json(planner.create_plan(&ctx, &request).await?))
}

async fn get_plan(
    State(planner): PlannerState,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let plan_id: PlanId = parse_id(&id, "plan")?;
    Ok(Json(planner.get_plan(&ctx, plan_id).await?))
}

async fn replan(
    State(planner): PlannerState,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
    body: Result<Json<ReplanRequest>, JsonRejection>,
) -> Result<Json<Plan>, ApiError> {
    let plan_id: PlanId = parse_id(&id, "plan")?;
    let Json(request) = body?;
    Ok(Json(planner.replan(&ctx, plan_id, &request).await?))
}

async fn progress(
    State(planner): PlannerState,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
) -> Result<Json<Vec<Progress>>, ApiError> {
    let plan_id: PlanId = parse_id(&id, "plan")?;
    Ok(Json(planner.progress(&ctx, plan_id).await?))
}

async fn list_plans(
    State(planner): PlannerState,
    Ctx(ctx): Ctx,
    Path(user): Path<String>,
) -> Result<Json<Vec<PlanSummary>>, ApiError> {
    Ok(Json(planner.list_user_plans(&ctx, &UserId::new(user)).await?))
}

async fn add_prerequisite(
    State(planner): PlannerState,
    Ctx(ctx): Ctx,
    body: Result<Json<PrerequisiteEdge>, JsonRejection>,
) -> Result<(StatusCode, Json<PrerequisiteEdge>), ApiError> {
    let Json(edge) = body?;
    planner.add_prerequisite(&ctx, &edge).await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

async fn health() -> Json<ServiceStatus> {
    Json(ServiceStatus::new("planner", true))
}
