use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use learnpath_core::ids::QuizId;
use learnpath_core::model::{Quiz, QuizAttempt};
use learnpath_quiz::{GenerateRequest, QuizEngine, SubmitRequest};

use super::{ServiceStatus, with_service_layers};
use crate::error::{ApiError, parse_id};
use crate::middleware::Ctx;

type Engine = State<Arc<QuizEngine>>;

pub fn quiz_router(engine: Arc<QuizEngine>) -> Router {
    let router = Router::new()
        .route("/generate", post(generate))
        .route("/submit", post(submit))
        .route("/quiz/:id", get(get_quiz))
        .route("/quiz/:id/attempts", get(attempts))
        .route("/health", get(health))
        .with_state(engine);
    with_service_layers(router)
}

async fn generate(
    State(engine): Engine,
    Ctx(ctx): Ctx,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<Quiz>, ApiError> {
    let Json(request) = body?;
    Ok(Json(engine.generate(&ctx, &request).await?))
}

async fn submit(
    State(engine): Engine,
    Ctx(ctx): Ctx,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<QuizAttempt>, ApiError> {
    let Json(request) = body?;
    Ok(Json(engine.submit(&ctx, &request).await?))
}

async fn get_quiz(
    State(engine): Engine,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
) -> Result<Json<Quiz>, ApiError> {
    let quiz_id: QuizId = parse_id(&id, "quiz")?;
    Ok(Json(engine.get_quiz(&ctx, quiz_id).await?))
}

async fn attempts(
    State(engine): Engine,
    Ctx(ctx): Ctx,
    Path(id): Path<String>,
) -> Result<Json<Vec<QuizAttempt>>, ApiError> {
    let quiz_id: QuizId = parse_id(&id, "quiz")?;
    Ok(Json(engine.attempts(&ctx, quiz_id).await?))
}

async fn health() -> Json<ServiceStatus> {
    Json(ServiceStatus::new("quiz", true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use learnpath_core::context::{TENANT_HEADER, USER_HEADER};
    use learnpath_core::model::{Difficulty, QuizOption, Resource};
    use learnpath_core::store::ResourceCatalog;
    use learnpath_quiz::{DraftQuestion, MemorySnippetStore, QuestionGenerator, QuizConfig, Snippet};
    use learnpath_store::TursoStore;
    use serde_json::json;

    const KAFKA: &str = "Each Kafka topic is split into partitions. Partitions are ordered, \
        append-only logs, and each one is replicated across several brokers for durability.";

    /// Cites the opening sentence of whatever snippet it is given.
    struct CitingGenerator;

    #[async_trait]
    impl QuestionGenerator for CitingGenerator {
        async fn generate(
            &self,
            snippets: &[Snippet],
            count: u32,
            _difficulty: Option<Difficulty>,
        ) -> learnpath_quiz::Result<Vec<DraftQuestion>> {
            Ok((0..count)
                .map(|i| DraftQuestion {
                    text: format!("Question {i} about {}?", snippets[0].title),
                    options: vec![QuizOption::new("A", "Partitions"), QuizOption::new("B", "Brokers")],
                    correct_option: "A".into(),
                    explanation: "Topics are split.".into(),
                    source_resource_id: Some(snippets[0].resource_id.to_string()),
                    citation: "Each Kafka topic is split into partitions".into(),
                })
                .collect())
        }
    }

    async fn server() -> TestServer {
        let store = Arc::new(TursoStore::new_memory().await.unwrap());
        store
            .upsert_resource(
                &Resource::new("kafka-101", "Kafka 101", "https://example.com/kafka")
                    .with_content_pointer("kafka-101.txt"),
            )
            .await
            .unwrap();
        store
            .upsert_resource(
                &Resource::new("tiny", "Tiny", "https://example.com/tiny").with_content_pointer("tiny.txt"),
            )
            .await
            .unwrap();
        let snippets = MemorySnippetStore::new();
        snippets.insert("kafka-101.txt", KAFKA).await;
        snippets.insert("tiny.txt", "Kafka splits topics into partitions, ok.").await;

        let engine = QuizEngine::new(
            store.clone(),
            Arc::new(snippets),
            Arc::new(CitingGenerator),
            store,
            QuizConfig::default(),
        );
        TestServer::new(quiz_router(Arc::new(engine))).unwrap()
    }

    #[tokio::test]
    async fn generate_then_submit_and_list_attempts() {
        let server = server().await;
        let quiz: Quiz = server
            .post("/generate")
            .add_header(TENANT_HEADER, "acme")
            .json(&json!({"resource_ids": ["kafka-101"], "num_questions": 2}))
            .await
            .json();
        assert_eq!(quiz.questions.len(), 2);
        assert!(quiz.questions.iter().all(|q| KAFKA.contains(&q.citation)));

        let answers: Vec<_> = quiz
            .questions
            .iter()
            .map(|q| json!({"question_id": q.id, "selected_option_id": "A"}))
            .collect();
        let attempt: QuizAttempt = server
            .post("/submit")
            .add_header(TENANT_HEADER, "acme")
            .add_header(USER_HEADER, "u-1")
            .json(&json!({"quiz_id": quiz.id, "answers": answers}))
            .await
            .json();
        assert_eq!(attempt.score, 100.0);
        assert_eq!(attempt.user_id.as_str(), "u-1");

        let attempts: Vec<QuizAttempt> = server
            .get(&format!("/quiz/{}/attempts", quiz.id))
            .add_header(TENANT_HEADER, "acme")
            .await
            .json();
        assert_eq!(attempts.len(), 1);
    }

    #[tokio::test]
    async fn short_content_is_unprocessable() {
        let server = server().await;
        let response = server
            .post("/generate")
            .json(&json!({"resource_ids": ["tiny"], "num_questions": 2}))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "no_groundable_content");
    }

    #[tokio::test]
    async fn unknown_quiz_is_not_found() {
        let server = server().await;
        server
            .get(&format!("/quiz/{}", QuizId::new()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/submit")
            .json(&json!({"quiz_id": QuizId::new(), "answers": []}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
