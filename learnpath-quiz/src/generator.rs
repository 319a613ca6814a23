//! Question drafting through a chat model.

use std::sync::Arc;

use async_trait::async_trait;
use learnpath_core::model::{Difficulty, QuizOption};
use learnpath_models::ModelProvider;
use learnpath_models::providers::{ChatRequest, Message};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::snippets::Snippet;
use crate::{QuizError, Result};

const SYSTEM_PROMPT: &str = "You are an expert educator writing multiple-choice quiz questions. \
Every question must quote its source verbatim in a citation. Each question has exactly one correct answer.";

/// A question as the model returned it, before grounding checks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DraftQuestion {
    #[serde(alias = "question_text", alias = "question")]
    pub text: String,
    #[serde(default)]
    pub options: Vec<QuizOption>,
    #[serde(default)]
    pub correct_option: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub source_resource_id: Option<String>,
    #[serde(default)]
    pub citation: String,
}

#[derive(Debug, Deserialize)]
struct DraftSet {
    #[serde(default)]
    questions: Vec<serde_json::Value>,
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Up to `count` drafts grounded in `snippets`.
    async fn generate(
        &self,
        snippets: &[Snippet],
        count: u32,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<DraftQuestion>>;
}

pub struct ModelQuestionGenerator {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ModelQuestionGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 3000,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl QuestionGenerator for ModelQuestionGenerator {
    async fn generate(
        &self,
        snippets: &[Snippet],
        count: u32,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<DraftQuestion>> {
        let request = ChatRequest::new(
            &self.model,
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(build_prompt(snippets, count, difficulty)),
            ],
        )
        .temperature(self.temperature)
        .max_tokens(self.max_tokens);

        let response = self
            .provider
            .chat(request)
            .await
            .map_err(|e| QuizError::GeneratorUnavailable(e.to_string()))?;
        let drafts = parse_drafts(&response.content);
        debug!(requested = count, parsed = drafts.len(), model = %self.model, "drafted questions");
        Ok(drafts)
    }
}

pub(crate) fn build_prompt(snippets: &[Snippet], count: u32, difficulty: Option<Difficulty>) -> String {
    let resources = snippets
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "[Resource {}: {}]\nTitle: {}\nContent:\n{}",
                i + 1,
                s.resource_id,
                s.title,
                s.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let difficulty = difficulty
        .map(|d| format!("\nDifficulty level: {d}"))
        .unwrap_or_default();

    format!(
        r#"Generate {count} multiple-choice quiz questions from the learning resources below.

RESOURCES:
{resources}

REQUIREMENTS:
1. Each question has 4 options with ids A, B, C and D.
2. Exactly one option is correct.
3. Explain why the correct option is right.
4. "citation" must be copied character for character from the content of the resource named in "source_resource_id".
5. Test understanding rather than recall.{difficulty}

Respond with JSON only:
{{
  "questions": [
    {{
      "question_text": "What is...",
      "options": [
        {{"id": "A", "text": "..."}},
        {{"id": "B", "text": "..."}},
        {{"id": "C", "text": "..."}},
        {{"id": "D", "text": "..."}}
      ],
      "correct_option": "A",
      "explanation": "...",
      "source_resource_id": "resource id",
      "citation": "exact quote"
    }}
  ]
}}

Generate exactly {count} questions."#
    )
}

/// The JSON body of a model reply: a ```json fence if present, else the outermost `{...}`.
fn json_body(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse drafts out of a model reply. Entries that do not fit the draft shape are dropped.
pub(crate) fn parse_drafts(text: &str) -> Vec<DraftQuestion> {
    let Some(body) = json_body(text) else {
        warn!("model reply contained no JSON object");
        return Vec::new();
    };
    let set: DraftSet = match serde_json::from_str(body) {
        Ok(set) => set,
        Err(e) => {
            warn!(error = %e, "model reply was not valid quiz JSON");
            return Vec::new();
        }
    };
    set.questions
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<DraftQuestion>(value) {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!(error = %e, "dropping malformed question");
                None
            }
        })
        .collect()
}
