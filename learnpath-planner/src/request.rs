//! Inbound shapes for plan creation and replanning.

use chrono::NaiveDate;
use learnpath_core::ids::{ResourceId, UserId};
use learnpath_core::model::{Goal, Level, Preferences};
use serde::{Deserialize, Serialize};

use crate::{PlanError, Result};

pub const MAX_BUDGET_HOURS: f64 = 1000.0;
pub const MAX_HOURS_PER_WEEK: f64 = 168.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    #[serde(default)]
    pub current_skills: Vec<String>,
    pub time_budget_hours: f64,
    pub hours_per_week: f64,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    /// Owner override for trusted callers. Ignored when the caller is authenticated.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl PlanRequest {
    pub fn new(goal: impl Into<String>, time_budget_hours: f64, hours_per_week: f64) -> Self {
        Self {
            goal: goal.into(),
            current_skills: Vec::new(),
            time_budget_hours,
            hours_per_week,
            preferences: Preferences::new(),
            level: Level::Basic,
            target_date: None,
            user_id: None,
        }
    }

    pub fn with_current_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.current_skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_preference(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.preferences.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.goal.trim().is_empty() {
            return Err(PlanError::Validation("goal must not be empty".into()));
        }
        if !(self.time_budget_hours > 0.0 && self.time_budget_hours <= MAX_BUDGET_HOURS) {
            return Err(PlanError::Validation(format!(
                "time_budget_hours must be in (0, {MAX_BUDGET_HOURS}]"
            )));
        }
        if !(self.hours_per_week > 0.0 && self.hours_per_week <= MAX_HOURS_PER_WEEK) {
            return Err(PlanError::Validation(format!(
                "hours_per_week must be in (0, {MAX_HOURS_PER_WEEK}]"
            )));
        }
        Ok(())
    }

    pub fn to_goal(&self) -> Goal {
        Goal {
            objective: self.goal.trim().to_string(),
            target_date: self.target_date,
            time_budget_hours: self.time_budget_hours,
            hours_per_week: self.hours_per_week,
            level: self.level,
            current_skills: self.current_skills.clone(),
            preferences: self.preferences.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplanRequest {
    #[serde(default)]
    pub completed_resources: Vec<ResourceId>,
    #[serde(default)]
    pub time_spent_hours: f64,
    #[serde(default)]
    pub remaining_time_hours: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl ReplanRequest {
    pub fn validate(&self) -> Result<()> {
        if !self.time_spent_hours.is_finite() || self.time_spent_hours < 0.0 {
            return Err(PlanError::Validation("time_spent_hours must be >= 0".into()));
        }
        if self
            .remaining_time_hours
            .is_some_and(|h| !h.is_finite() || h < 0.0)
        {
            return Err(PlanError::Validation("remaining_time_hours must be >= 0".into()));
        }
        Ok(())
    }
}
