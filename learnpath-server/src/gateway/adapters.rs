//! Conversion between the gateway's public shapes and the services' domain records.
//!
//! Services speak in [`Plan`], [`Quiz`] and [`SearchOutcome`]; clients of the gateway see
//! milestones, question views without answers, and flat search results. Every such
//! mapping lives here.

use chrono::{DateTime, Utc};
use learnpath_core::ids::{AttemptId, LessonId, PlanId, QuestionId, QuizId, ResourceId, SkillId, UserId};
use learnpath_core::model::{
    Difficulty, Lesson, LessonResource, Level, Plan, PlanSummary, QuestionResult, Quiz, QuizAttempt,
    QuizOption, minutes_to_hours,
};
use learnpath_core::{ErrorCode, TenantId};
use learnpath_retrieval::{ResourceCard, SearchOutcome, SearchRequest};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// `POST /api/search` body. The tenant always comes from the caller's token.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySearchBody {
    #[serde(flatten)]
    pub search: SearchRequest,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl GatewaySearchBody {
    pub fn into_request(self, tenant: &TenantId) -> SearchRequest {
        if let Some(claimed) = self.tenant_id.as_deref() {
            if claimed != tenant.as_str() {
                warn!(claimed, tenant = %tenant, "ignoring tenant_id in search body");
            }
        }
        self.search
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub resource_id: ResourceId,
    pub title: String,
    pub url: String,
    pub score: f32,
    pub why_relevant: String,
    pub duration_min: u32,
    pub level: Option<Level>,
    pub media_type: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub reranked: bool,
}

impl From<ResourceCard> for SearchResult {
    fn from(card: ResourceCard) -> Self {
        let resource = card.resource;
        Self {
            resource_id: resource.id,
            title: resource.title,
            url: resource.url,
            score: card.score,
            why_relevant: card.why_relevant,
            duration_min: resource.duration_min,
            level: resource.level,
            media_type: resource.media_type,
            provider: resource.provider,
        }
    }
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            results: outcome.cards.into_iter().map(SearchResult::from).collect(),
            reranked: outcome.reranked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneResource {
    pub resource_id: ResourceId,
    pub title: String,
    pub url: String,
    pub duration_min: u32,
    pub level: Option<Level>,
    pub why_included: String,
}

impl From<LessonResource> for MilestoneResource {
    fn from(resource: LessonResource) -> Self {
        Self {
            resource_id: resource.resource_id,
            title: resource.title,
            url: resource.url,
            duration_min: resource.duration_min,
            level: resource.level,
            why_included: resource.why_included,
        }
    }
}

/// One lesson as the public API presents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub milestone_id: LessonId,
    pub title: String,
    pub order: u32,
    pub week: u32,
    pub resources: Vec<MilestoneResource>,
    pub estimated_hours: f64,
    pub skills_gained: Vec<SkillId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn milestone(order: u32, lesson: Lesson) -> Milestone {
    let mut skills_gained = vec![lesson.skill_id.clone()];
    for resource in &lesson.resources {
        for skill in &resource.skills {
            if !skills_gained.contains(skill) {
                skills_gained.push(skill.clone());
            }
        }
    }
    Milestone {
        milestone_id: lesson.id,
        title: lesson.title,
        order,
        week: lesson.week,
        estimated_hours: minutes_to_hours(lesson.duration_min),
        resources: lesson.resources.into_iter().map(MilestoneResource::from).collect(),
        skills_gained,
        note: lesson.note,
    }
}

/// Why a quiz requested alongside a plan is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizFailure {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub plan_id: PlanId,
    pub user_id: UserId,
    pub goal: String,
    pub total_hours: f64,
    pub estimated_weeks: u32,
    pub milestones: Vec<Milestone>,
    pub reasoning: String,
    pub revision: u32,
    pub prerequisites_met: Vec<SkillId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub quiz: Option<QuizView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_error: Option<QuizFailure>,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        let total_hours = minutes_to_hours(plan.total_minutes());
        let milestones = plan
            .lessons
            .into_iter()
            .zip(1u32..)
            .map(|(lesson, order)| milestone(order, lesson))
            .collect();
        Self {
            plan_id: plan.id,
            user_id: plan.user_id,
            goal: plan.goal.objective,
            total_hours,
            estimated_weeks: plan.total_weeks,
            milestones,
            reasoning: plan.reasoning.join("\n"),
            revision: plan.revision,
            prerequisites_met: plan.prerequisites_met,
            created_at: plan.created_at,
            updated_at: plan.updated_at,
            quiz: None,
            quiz_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanListItem {
    pub plan_id: PlanId,
    pub goal: String,
    pub estimated_weeks: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanListResponse {
    pub plans: Vec<PlanListItem>,
}

impl From<Vec<PlanSummary>> for PlanListResponse {
    fn from(summaries: Vec<PlanSummary>) -> Self {
        Self {
            plans: summaries
                .into_iter()
                .map(|s| PlanListItem {
                    plan_id: s.plan_id,
                    goal: s.goal,
                    estimated_weeks: s.estimated_weeks,
                    created_at: s.created_at,
                })
                .collect(),
        }
    }
}

/// A question without its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub question_id: QuestionId,
    pub text: String,
    pub options: Vec<QuizOption>,
    pub citation: String,
    pub explanation: String,
    pub source_resource_id: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizView {
    pub quiz_id: QuizId,
    pub title: String,
    pub difficulty: Option<Difficulty>,
    pub resource_ids: Vec<ResourceId>,
    pub questions: Vec<QuestionView>,
    pub created_at: DateTime<Utc>,
}

impl From<Quiz> for QuizView {
    fn from(quiz: Quiz) -> Self {
        Self {
            quiz_id: quiz.id,
            title: quiz.title,
            difficulty: quiz.difficulty,
            resource_ids: quiz.resource_ids,
            questions: quiz
                .questions
                .into_iter()
                .map(|q| QuestionView {
                    question_id: q.id,
                    text: q.text,
                    options: q.options,
                    citation: q.citation,
                    explanation: q.explanation,
                    source_resource_id: q.source_resource_id,
                })
                .collect(),
            created_at: quiz.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub attempt_id: AttemptId,
    pub quiz_id: QuizId,
    pub score: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub results: Vec<QuestionResult>,
}

impl From<QuizAttempt> for SubmitResponse {
    fn from(attempt: QuizAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            quiz_id: attempt.quiz_id,
            score: attempt.score,
            correct_answers: attempt.correct_count,
            total_questions: attempt.total,
            results: attempt.results,
        }
    }
}
