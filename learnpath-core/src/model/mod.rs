//! Domain records shared by the planner, quiz engine, retrieval pipeline and store.

mod plan;
mod quiz;
mod resource;
mod skill;

pub use plan::{
    Goal, Lesson, LessonResource, Plan, PlanSummary, Preferences, Progress, ProgressStatus,
    hours_to_minutes, minutes_to_hours,
};
pub use quiz::{Answer, Difficulty, Question, QuestionResult, Quiz, QuizAttempt, QuizOption};
pub use resource::Resource;
pub use skill::{Level, PrerequisiteEdge, Skill};
