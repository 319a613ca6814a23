//! End-to-end flows through the gateway and real services.

mod common;

use common::{Stack, bearer};
use learnpath_core::TenantId;
use reqwest::StatusCode;
use serde_json::{Value, json};

fn python_plan(generate_quiz: bool) -> Value {
    json!({
        "goal": "Learn Python basics",
        "time_budget_hours": 10,
        "hours_per_week": 5,
        "preferences": {"target_skills": ["syntax", "control"]},
        "generate_quiz": generate_quiz
    })
}

#[tokio::test]
async fn full_flow_builds_a_plan_and_a_grounded_quiz() {
    let stack = Stack::start().await;
    let response = stack
        .post("/api/plan")
        .header("authorization", bearer("learner-1", "acme"))
        .json(&python_plan(true))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let plan: Value = response.json().await.unwrap();

    assert_eq!(plan["user_id"], "learner-1");
    let milestones = plan["milestones"].as_array().unwrap();
    let titles: Vec<_> = milestones
        .iter()
        .map(|m| m["resources"][0]["resource_id"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["py-syntax", "py-control"]);
    for milestone in milestones {
        assert!(milestone["estimated_hours"].as_f64().unwrap() <= 5.0);
    }

    let quiz = &plan["quiz"];
    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(quiz["difficulty"], "medium");
    for question in questions {
        assert!(question.get("correct_option").is_none());
        let citation = question["citation"].as_str().unwrap();
        assert!(common::SYNTAX_TEXT.contains(citation) || common::CONTROL_TEXT.contains(citation));
    }
    assert!(plan.get("quiz_error").is_none());
}

#[tokio::test]
async fn plan_without_quiz_then_fetch_list_and_replan() {
    let stack = Stack::start().await;
    let auth = bearer("learner-2", "acme");
    let created: Value = stack
        .post("/api/plan")
        .header("authorization", &auth)
        .json(&python_plan(false))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(created["quiz"].is_null());
    let plan_id = created["plan_id"].as_str().unwrap().to_string();

    let fetched: Value = stack
        .get(&format!("/api/plan/{plan_id}"))
        .header("authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["plan_id"], created["plan_id"]);

    let listed: Value = stack
        .get("/api/plan/user/learner-2/plans")
        .header("authorization", &auth)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["plans"].as_array().unwrap().len(), 1);

    let replanned: Value = stack
        .post(&format!("/api/plan/{plan_id}/replan"))
        .header("authorization", &auth)
        .json(&json!({"completed_resources": ["py-syntax"], "time_spent_hours": 2, "feedback": "too easy"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(replanned["plan_id"], created["plan_id"]);
    assert_eq!(replanned["revision"], 1);
    assert!(replanned["reasoning"].as_str().unwrap().contains("too easy"));
}

#[tokio::test]
async fn other_tenants_cannot_see_a_plan() {
    let stack = Stack::start().await;
    let created: Value = stack
        .post("/api/plan")
        .header("authorization", bearer("learner-3", "acme"))
        .json(&python_plan(false))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = stack
        .get(&format!("/api/plan/{}", created["plan_id"].as_str().unwrap()))
        .header("authorization", bearer("intruder", "other-tenant"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn search_never_leaks_other_tenants() {
    let stack = Stack::start().await;
    let response: Value = stack
        .post("/api/search")
        .header("authorization", bearer("learner-4", "acme"))
        .json(&json!({"query": "kafka partitioning", "tenant_id": "other-tenant"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<_> = response["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["resource_id"].as_str().unwrap().to_string())
        .collect();
    assert!(ids.contains(&"kafka-acme".to_string()));
    assert!(ids.contains(&"kafka-global".to_string()));
    assert!(!ids.contains(&"kafka-other".to_string()));
}

#[tokio::test]
async fn quiz_generate_and_submit_through_the_gateway() {
    let stack = Stack::start().await;
    let auth = bearer("learner-5", "acme");
    let quiz: Value = stack
        .post("/api/quiz/generate")
        .header("authorization", &auth)
        .json(&json!({"resource_ids": ["py-syntax"], "num_questions": 2}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);

    let answers: Vec<Value> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            json!({
                "question_id": q["question_id"],
                "selected_option_id": if i == 0 { "A" } else { "B" }
            })
        })
        .collect();
    let result: Value = stack
        .post("/api/quiz/submit")
        .header("authorization", &auth)
        .json(&json!({"quiz_id": quiz["quiz_id"], "answers": answers}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["score"], 50.0);
    assert_eq!(result["correct_answers"], 1);
    assert_eq!(result["total_questions"], 2);
}

#[tokio::test]
async fn ingest_is_queued_under_the_token_tenant() {
    let stack = Stack::start().await;
    let response: Value = stack
        .post("/api/ingest/resources")
        .header("authorization", bearer("learner-6", "acme"))
        .json(&json!({"urls": ["https://example.com/new"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["accepted"], 1);
    let pending = stack.store.pending_ingest(&TenantId::new("acme")).await.unwrap();
    assert_eq!(pending, vec!["https://example.com/new".to_string()]);
}

#[tokio::test]
async fn missing_token_is_unauthorized_and_request_id_is_echoed() {
    let stack = Stack::start().await;
    let response = stack
        .post("/api/search")
        .header("x-request-id", "trace-me")
        .json(&json!({"query": "kafka"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-request-id"], "trace-me");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "unauthorized");
    assert_eq!(body["request_id"], "trace-me");
}

#[tokio::test]
async fn downstream_errors_carry_the_caller_request_id() {
    let stack = Stack::start().await;
    let response = stack
        .get("/api/plan/00000000-0000-7000-8000-000000000000")
        .header("authorization", bearer("learner-7", "acme"))
        .header("x-request-id", "corr-404")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["request_id"], "corr-404");
}

#[tokio::test]
async fn health_reports_every_service() {
    let stack = Stack::start().await;
    let health: Value = stack.get("/health").send().await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    for service in ["retrieval", "planner", "quiz"] {
        assert_eq!(health["services"][service]["reachable"], true);
    }
}
