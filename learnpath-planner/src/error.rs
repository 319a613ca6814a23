use learnpath_core::store::StoreError;
use learnpath_core::{ErrorCode, GraphError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid plan request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// No skill in the catalog could be matched to the goal.
    #[error("no skills match the goal: {0}")]
    NoMatchingSkills(String),

    #[error("prerequisite conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PlanError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PlanError::Validation(_) => ErrorCode::InvalidRequest,
            PlanError::NotFound(_)
            | PlanError::NoMatchingSkills(_)
            | PlanError::Store(StoreError::NotFound(_)) => ErrorCode::NotFound,
            PlanError::Conflict(_) => ErrorCode::Conflict,
            PlanError::Store(_) => ErrorCode::Internal,
        }
    }
}

impl From<GraphError> for PlanError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnknownSkill(id) => PlanError::NotFound(format!("skill {id}")),
            cycle @ GraphError::Cycle { .. } => PlanError::Conflict(cycle.to_string()),
        }
    }
}
