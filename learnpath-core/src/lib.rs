//! learnpath-core - domain model and shared plumbing for the learning-path services
//!
//! This crate holds everything the retrieval pipeline, plan constructor, quiz engine and
//! gateway agree on: identifiers, the per-request context (correlation id, tenant, caller,
//! deadline), the skill prerequisite graph, storage contracts, stable error codes, bearer
//! token validation, and the idempotency replay cache.

pub mod auth;
pub mod context;
pub mod error;
pub mod graph;
pub mod idempotency;
pub mod ids;
pub mod model;
pub mod store;

pub use auth::{AuthConfig, AuthContext, AuthError, BearerValidator, Identity, VerificationMode};
pub use context::{RequestContext, RequestId, TenantId};
pub use error::{ErrorBody, ErrorCode};
pub use graph::{GraphError, SkillGraph};
pub use idempotency::IdempotencyCache;
pub use ids::{AttemptId, LessonId, PlanId, QuestionId, QuizId, ResourceId, SkillId, UserId};
