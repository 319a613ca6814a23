use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::TenantId;
use crate::ids::{AttemptId, QuestionId, QuizId, ResourceId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

impl QuizOption {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A stored question. `citation` is a verbatim span of the source resource's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<QuizOption>,
    pub correct_option: String,
    pub explanation: String,
    pub source_resource_id: ResourceId,
    pub citation: String,
}

impl Question {
    /// At least one option, unique option ids, and exactly one matching the correct id.
    pub fn is_well_formed(&self) -> bool {
        if self.options.is_empty() || self.text.trim().is_empty() {
            return false;
        }
        let mut ids = HashSet::new();
        if !self.options.iter().all(|o| ids.insert(o.id.as_str())) {
            return false;
        }
        self.options
            .iter()
            .filter(|o| o.id == self.correct_option)
            .count()
            == 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub tenant: TenantId,
    pub title: String,
    pub resource_ids: Vec<ResourceId>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: QuestionId,
    pub selected_option_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    #[serde(default)]
    pub selected_option_id: Option<String>,
    pub correct_option_id: String,
    pub is_correct: bool,
    pub explanation: String,
    pub citation: String,
}

/// A graded submission. Never updated after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub answers: Vec<Answer>,
    pub score: f64,
    pub correct_count: u32,
    pub total: u32,
    pub results: Vec<QuestionResult>,
    pub created_at: DateTime<Utc>,
}
