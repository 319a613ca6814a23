//! Quiz generation with grounding enforcement, and grading.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use learnpath_core::context::RequestContext;
use learnpath_core::ids::{AttemptId, QuestionId, QuizId, ResourceId};
use learnpath_core::model::{Answer, Difficulty, Question, QuestionResult, Quiz, QuizAttempt, Resource};
use learnpath_core::store::{QuizStore, ResourceCatalog};
use learnpath_core::IdempotencyCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::generator::QuestionGenerator;
use crate::grounding;
use crate::snippets::{Snippet, SnippetStore};
use crate::{QuizError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Snippets shorter than this (in characters) cannot ground a question.
    pub min_snippet_chars: usize,
    /// Extra generation rounds for questions that failed grounding.
    pub max_regenerations: u32,
    pub default_questions: u32,
    pub max_questions: u32,
    pub idempotency_ttl_secs: u64,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            min_snippet_chars: 100,
            max_regenerations: 2,
            default_questions: 5,
            max_questions: 20,
            idempotency_ttl_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub resource_ids: Vec<ResourceId>,
    #[serde(default)]
    pub num_questions: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub title: Option<String>,
}

impl GenerateRequest {
    pub fn new<I, S>(resource_ids: I, num_questions: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceId>,
    {
        Self {
            resource_ids: resource_ids.into_iter().map(Into::into).collect(),
            num_questions: Some(num_questions),
            ..Self::default()
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub quiz_id: QuizId,
    pub answers: Vec<Answer>,
}

pub struct QuizEngine {
    catalog: Arc<dyn ResourceCatalog>,
    snippets: Arc<dyn SnippetStore>,
    generator: Arc<dyn QuestionGenerator>,
    store: Arc<dyn QuizStore>,
    config: QuizConfig,
    replays: IdempotencyCache<Quiz>,
}

impl QuizEngine {
    pub fn new(
        catalog: Arc<dyn ResourceCatalog>,
        snippets: Arc<dyn SnippetStore>,
        generator: Arc<dyn QuestionGenerator>,
        store: Arc<dyn QuizStore>,
        config: QuizConfig,
    ) -> Self {
        let replays = IdempotencyCache::new(Duration::from_secs(config.idempotency_ttl_secs));
        Self {
            catalog,
            snippets,
            generator,
            store,
            config,
            replays,
        }
    }

    fn question_count(&self, request: &GenerateRequest) -> Result<u32> {
        if request.resource_ids.is_empty() {
            return Err(QuizError::Validation("resource_ids must not be empty".into()));
        }
        let count = request.num_questions.unwrap_or(self.config.default_questions);
        if count == 0 || count > self.config.max_questions {
            return Err(QuizError::Validation(format!(
                "num_questions must be between 1 and {}",
                self.config.max_questions
            )));
        }
        Ok(count)
    }

    /// Load cached content for each visible resource, dropping anything unusable.
    async fn usable_snippets(&self, ctx: &RequestContext, ids: &[ResourceId]) -> Result<Vec<Snippet>> {
        let resources: Vec<Resource> = self
            .catalog
            .get_resources(ids)
            .await?
            .into_iter()
            .filter(|r| ctx.tenant.can_see(&r.tenant))
            .collect();

        let fetched = join_all(resources.iter().map(|resource| async move {
            let pointer = resource.content_pointer.as_deref()?;
            match self.snippets.fetch(pointer).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(resource_id = %resource.id, error = %e, "snippet fetch failed");
                    None
                }
            }
        }))
        .await;

        let snippets = resources
            .iter()
            .zip(fetched)
            .filter_map(|(resource, content)| {
                let content = content?;
                let chars = content.trim().chars().count();
                if chars < self.config.min_snippet_chars {
                    debug!(resource_id = %resource.id, chars, "snippet too short to ground questions");
                    return None;
                }
                Some(Snippet {
                    resource_id: resource.id.clone(),
                    title: resource.title.clone(),
                    content,
                })
            })
            .collect();
        Ok(snippets)
    }

    #[instrument(skip(self, ctx, request), fields(request_id = %ctx.request_id, tenant_id = %ctx.tenant))]
    pub async fn generate(&self, ctx: &RequestContext, request: &GenerateRequest) -> Result<Quiz> {
        let wanted = self.question_count(request)?;
        if let Some(quiz) = self.replays.lookup("generate_quiz", ctx) {
            info!(quiz_id = %quiz.id, "returning quiz for repeated idempotency key");
            return Ok(quiz);
        }

        let snippets = self.usable_snippets(ctx, &request.resource_ids).await?;
        if snippets.is_empty() {
            warn!(requested = request.resource_ids.len(), "no groundable content");
            return Err(QuizError::NoGroundableContent);
        }

        let mut accepted: Vec<Question> = Vec::new();
        let mut seen_text: HashSet<String> = HashSet::new();
        let mut rejected = 0usize;
        for round in 0..=self.config.max_regenerations {
            let missing = wanted - accepted.len() as u32;
            if missing == 0 {
                break;
            }
            let drafts = match self.generator.generate(&snippets, missing, request.difficulty).await {
                Ok(drafts) => drafts,
                Err(e) if round == 0 => return Err(e),
                Err(e) => {
                    warn!(round, error = %e, "regeneration failed, keeping grounded questions");
                    break;
                }
            };
            for draft in drafts {
                if accepted.len() as u32 == wanted {
                    break;
                }
                match grounding::ground(&draft, &snippets) {
                    Ok(question) if seen_text.insert(question.text.to_lowercase()) => {
                        accepted.push(question)
                    }
                    Ok(_) => debug!(round, "duplicate question dropped"),
                    Err(reason) => {
                        rejected += 1;
                        debug!(round, %reason, "question rejected");
                    }
                }
            }
        }

        if accepted.is_empty() {
            warn!(rejected, "every generated question failed grounding");
            return Err(QuizError::UngroundableContent { rejected });
        }
        if (accepted.len() as u32) < wanted {
            warn!(wanted, kept = accepted.len(), rejected, "quiz is short of requested questions");
        }

        let title = request.title.clone().unwrap_or_else(|| match snippets.as_slice() {
            [only] => format!("Quiz: {}", only.title),
            many => format!("Quiz over {} resources", many.len()),
        });
        let quiz = Quiz {
            id: QuizId::new(),
            tenant: ctx.tenant.clone(),
            title,
            resource_ids: snippets.iter().map(|s| s.resource_id.clone()).collect(),
            difficulty: request.difficulty,
            questions: accepted,
            created_at: Utc::now(),
        };
        self.store.insert_quiz(&quiz).await?;
        self.replays.remember("generate_quiz", ctx, quiz.clone());

        info!(quiz_id = %quiz.id, questions = quiz.questions.len(), rejected, "quiz generated");
        Ok(quiz)
    }

    pub async fn get_quiz(&self, ctx: &RequestContext, quiz_id: QuizId) -> Result<Quiz> {
        self.store
            .get_quiz(quiz_id)
            .await?
            .filter(|quiz| quiz.tenant == ctx.tenant)
            .ok_or_else(|| QuizError::NotFound(format!("quiz {quiz_id}")))
    }

    /// Grade a submission and persist the attempt.
    #[instrument(skip(self, ctx, request), fields(request_id = %ctx.request_id, quiz_id = %request.quiz_id))]
    pub async fn submit(&self, ctx: &RequestContext, request: &SubmitRequest) -> Result<QuizAttempt> {
        let quiz = self.get_quiz(ctx, request.quiz_id).await?;
        let attempt = grade(&quiz, ctx, &request.answers);
        self.store.insert_attempt(&attempt).await?;
        info!(
            attempt_id = %attempt.id,
            score = attempt.score,
            correct = attempt.correct_count,
            total = attempt.total,
            "quiz graded"
        );
        Ok(attempt)
    }

    pub async fn attempts(&self, ctx: &RequestContext, quiz_id: QuizId) -> Result<Vec<QuizAttempt>> {
        self.get_quiz(ctx, quiz_id).await?;
        Ok(self.store.list_attempts(quiz_id).await?)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score a submission. The last answer given for a question wins; unanswered questions
/// count as incorrect.
pub(crate) fn grade(quiz: &Quiz, ctx: &RequestContext, answers: &[Answer]) -> QuizAttempt {
    let known: HashSet<QuestionId> = quiz.questions.iter().map(|q| q.id).collect();
    let mut selected: HashMap<QuestionId, &str> = HashMap::new();
    for answer in answers {
        if !known.contains(&answer.question_id) {
            warn!(question_id = %answer.question_id, "answer for a question not in this quiz");
            continue;
        }
        if selected
            .insert(answer.question_id, answer.selected_option_id.as_str())
            .is_some()
        {
            warn!(
                question_id = %answer.question_id,
                "duplicate answers for one question, keeping the last (possible client bug)"
            );
        }
    }

    let results: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .map(|question| {
            let choice = selected.get(&question.id).copied();
            QuestionResult {
                question_id: question.id,
                selected_option_id: choice.map(str::to_string),
                correct_option_id: question.correct_option.clone(),
                is_correct: choice == Some(question.correct_option.as_str()),
                explanation: question.explanation.clone(),
                citation: question.citation.clone(),
            }
        })
        .collect();

    let total = results.len() as u32;
    let correct_count = results.iter().filter(|r| r.is_correct).count() as u32;
    let score = if total == 0 {
        0.0
    } else {
        round2(f64::from(correct_count) / f64::from(total) * 100.0)
    };

    QuizAttempt {
        id: AttemptId::new(),
        quiz_id: quiz.id,
        user_id: ctx.owner(),
        answers: answers.to_vec(),
        score,
        correct_count,
        total,
        results,
        created_at: Utc::now(),
    }
}
