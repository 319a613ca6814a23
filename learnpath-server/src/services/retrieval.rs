use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use learnpath_retrieval::{EmbedKind, RetrievalPipeline, SearchOutcome, SearchRequest};
use serde::{Deserialize, Serialize};

use super::{ServiceStatus, with_service_layers};
use crate::client::{IngestAccepted, IngestRequest};
use crate::error::ApiError;
use crate::middleware::Ctx;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
    #[serde(default)]
    pub kind: EmbedKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

type Pipeline = State<Arc<RetrievalPipeline>>;

pub fn retrieval_router(pipeline: Arc<RetrievalPipeline>) -> Router {
    let router = Router::new()
        .route("/search", post(search))
        .route("/embed", post(embed))
        .route("/ingest/resources", post(ingest))
        .route("/health", get(health))
        .with_state(pipeline);
    with_service_layers(router)
}

async fn search(
    State(pipeline): Pipeline,
    Ctx(ctx): Ctx,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchOutcome>, ApiError> {
    let Json(request) = body?;
    Ok(Json(pipeline.search(&ctx, &request).await?))
}

async fn embed(
    State(pipeline): Pipeline,
    body: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let Json(request) = body?;
    let embeddings = pipeline.embed(&request.texts, request.kind).await?;
    Ok(Json(EmbedResponse { embeddings }))
}

async fn ingest(
    State(pipeline): Pipeline,
    Ctx(ctx): Ctx,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestAccepted>, ApiError> {
    let Json(request) = body?;
    let accepted = pipeline.ingest(&ctx, &request.urls).await?;
    Ok(Json(IngestAccepted { accepted }))
}

async fn health(State(pipeline): Pipeline) -> Json<ServiceStatus> {
    Json(ServiceStatus::new("retrieval", pipeline.is_healthy().await))
}
