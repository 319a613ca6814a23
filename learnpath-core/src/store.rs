//! Storage contracts. The relational engine itself lives behind these traits.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::TenantId;
use crate::ids::{PlanId, QuizId, ResourceId, UserId};
use crate::model::{
    Plan, PlanSummary, PrerequisiteEdge, Progress, Quiz, QuizAttempt, Resource, Skill,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored data is invalid: {0}")]
    InvalidData(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait SkillStore: Send + Sync {
    async fn list_skills(&self) -> Result<Vec<Skill>>;

    async fn list_prerequisites(&self) -> Result<Vec<PrerequisiteEdge>>;

    async fn upsert_skill(&self, skill: &Skill) -> Result<()>;

    /// Persist an edge. Callers check acyclicity before calling.
    async fn insert_prerequisite(&self, edge: &PrerequisiteEdge) -> Result<()>;

    async fn remove_prerequisite(&self, edge: &PrerequisiteEdge) -> Result<()>;
}

#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Resources with the given ids, in the requested order. Missing ids are skipped.
    async fn get_resources(&self, ids: &[ResourceId]) -> Result<Vec<Resource>>;

    async fn list_resources(&self) -> Result<Vec<Resource>>;

    async fn upsert_resource(&self, resource: &Resource) -> Result<()>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn insert_plan(&self, plan: &Plan) -> Result<()>;

    async fn get_plan(&self, id: PlanId) -> Result<Option<Plan>>;

    /// Replace the lesson list and reasoning of an existing plan, keeping its id.
    async fn update_plan(&self, plan: &Plan) -> Result<()>;

    async fn list_plans(&self, tenant: &TenantId, user: &UserId) -> Result<Vec<PlanSummary>>;

    /// Insert or replace progress rows keyed by (lesson, user).
    async fn record_progress(&self, progress: &[Progress]) -> Result<()>;

    async fn list_progress(&self, plan_id: PlanId, user: &UserId) -> Result<Vec<Progress>>;
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<()>;

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>>;

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<()>;

    async fn list_attempts(&self, quiz_id: QuizId) -> Result<Vec<QuizAttempt>>;
}

/// Hand-off point to the external ingestion process.
#[async_trait]
pub trait IngestQueue: Send + Sync {
    /// Queue URLs for ingestion. Returns how many were accepted.
    async fn enqueue(&self, tenant: &TenantId, urls: &[String]) -> Result<usize>;
}
