use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Level;
use crate::context::TenantId;
use crate::ids::{LessonId, PlanId, ResourceId, SkillId, UserId};

/// Free-form learner preferences. Recognised keys are read by the planner.
pub type Preferences = BTreeMap<String, serde_json::Value>;

/// What the learner asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub objective: String,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    pub time_budget_hours: f64,
    pub hours_per_week: f64,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub current_skills: Vec<String>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Goal {
    pub fn budget_minutes(&self) -> u32 {
        hours_to_minutes(self.time_budget_hours)
    }

    pub fn weekly_minutes(&self) -> u32 {
        hours_to_minutes(self.hours_per_week)
    }

    /// String list preference, e.g. `target_skills` or `media_types`.
    pub fn preference_list(&self, key: &str) -> Vec<String> {
        match self.preferences.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Converts fractional hours to whole minutes, rounding to the nearest minute.
pub fn hours_to_minutes(hours: f64) -> u32 {
    if !hours.is_finite() || hours <= 0.0 {
        return 0;
    }
    (hours * 60.0).round() as u32
}

pub fn minutes_to_hours(minutes: u32) -> f64 {
    (f64::from(minutes) / 60.0 * 100.0).round() / 100.0
}

/// A resource slotted into a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonResource {
    pub resource_id: ResourceId,
    pub title: String,
    pub url: String,
    pub duration_min: u32,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub skills: Vec<SkillId>,
    pub why_included: String,
}

/// One skill's worth of study, scheduled into a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub week: u32,
    pub seq: u32,
    pub title: String,
    pub skill_id: SkillId,
    pub skill_name: String,
    pub resources: Vec<LessonResource>,
    pub duration_min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Lesson {
    pub fn resource_minutes(&self) -> u32 {
        self.resources.iter().map(|r| r.duration_min).sum()
    }
}

/// A persisted learning plan. The id is stable; replanning swaps the lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub tenant: TenantId,
    pub user_id: UserId,
    pub goal: Goal,
    pub lessons: Vec<Lesson>,
    pub total_weeks: u32,
    #[serde(default)]
    pub reasoning: Vec<String>,
    #[serde(default)]
    pub prerequisites_met: Vec<SkillId>,
    #[serde(default)]
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn total_minutes(&self) -> u32 {
        self.lessons.iter().map(|l| l.duration_min).sum()
    }

    pub fn week_minutes(&self, week: u32) -> u32 {
        self.lessons
            .iter()
            .filter(|l| l.week == week)
            .map(|l| l.duration_min)
            .sum()
    }

    pub fn lessons_in_week(&self, week: u32) -> impl Iterator<Item = &Lesson> {
        self.lessons.iter().filter(move |l| l.week == week)
    }

    /// Distinct resource ids in schedule order.
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        let mut seen = Vec::new();
        for lesson in &self.lessons {
            for resource in &lesson.resources {
                if !seen.contains(&resource.resource_id) {
                    seen.push(resource.resource_id.clone());
                }
            }
        }
        seen
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            plan_id: self.id,
            goal: self.goal.objective.clone(),
            estimated_weeks: self.total_weeks,
            total_minutes: self.total_minutes(),
            revision: self.revision,
            created_at: self.created_at,
        }
    }
}

/// Listing view of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_id: PlanId,
    pub goal: String,
    pub estimated_weeks: u32,
    pub total_minutes: u32,
    pub revision: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Todo,
    InProgress,
    Done,
    Skipped,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Todo => "todo",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Done => "done",
            ProgressStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(ProgressStatus::Todo),
            "in_progress" => Some(ProgressStatus::InProgress),
            "done" => Some(ProgressStatus::Done),
            "skipped" => Some(ProgressStatus::Skipped),
            _ => None,
        }
    }
}

/// Learner progress on one lesson. One row per (lesson, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub lesson_id: LessonId,
    pub plan_id: PlanId,
    pub user_id: UserId,
    pub status: ProgressStatus,
    pub minutes_spent: u32,
    #[serde(default)]
    pub quiz_score: Option<f64>,
    pub updated_at: DateTime<Utc>,
}
