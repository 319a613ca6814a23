//! Shared test utilities for learnpath-server integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::any;
use jsonwebtoken::{EncodingKey, Header, encode};
use learnpath_core::context::TenantId;
use learnpath_core::model::{Difficulty, PrerequisiteEdge, QuizOption, Resource, Skill};
use learnpath_core::store::{ResourceCatalog, SkillStore};
use learnpath_core::AuthConfig;
use learnpath_planner::{Planner, PlannerConfig};
use learnpath_quiz::{DraftQuestion, MemorySnippetStore, QuestionGenerator, QuizConfig, QuizEngine, Snippet};
use learnpath_retrieval::{HashingEmbedder, MemoryIndex, RetrievalPipeline};
use learnpath_server::client::{DownstreamClient, RetryPolicy, RetrievalApi};
use learnpath_server::{
    GatewayConfig, LearnpathServer, ServerConfig, planner_router, quiz_router, retrieval_router,
};
use learnpath_store::TursoStore;
use tokio::net::TcpListener;

pub const SECRET: &str = "integration-secret";

pub const SYNTAX_TEXT: &str = "Python uses indentation to delimit blocks. A statement ends at the end \
    of the line, and variables are created the first time a value is assigned to them.";
pub const CONTROL_TEXT: &str = "The for statement iterates over the items of any sequence. The while \
    statement repeats a block as long as its condition stays true, and break leaves the loop.";

/// Spawns a router in a background task, returns the bound address
pub async fn spawn(name: &'static str, router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = LearnpathServer::new(name, ServerConfig::new("127.0.0.1", addr.port()), router);

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(Duration::from_millis(10)).await;

    addr
}

pub fn url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

/// Retries without the production backoff so tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 5,
        attempt_timeout_secs: 5,
    }
}

pub fn token(user: &str, tenant: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    encode(
        &Header::default(),
        &serde_json::json!({ "sub": user, "app_metadata": { "tenant_id": tenant }, "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(user: &str, tenant: &str) -> String {
    format!("Bearer {}", token(user, tenant))
}

/// Cites the first sentence of each snippet in turn.
struct FirstSentenceGenerator;

#[async_trait]
impl QuestionGenerator for FirstSentenceGenerator {
    async fn generate(
        &self,
        snippets: &[Snippet],
        count: u32,
        _difficulty: Option<Difficulty>,
    ) -> learnpath_quiz::Result<Vec<DraftQuestion>> {
        Ok((0..count as usize)
            .map(|i| {
                let snippet = &snippets[i % snippets.len()];
                let citation = snippet.content.split('.').next().unwrap_or_default().to_string();
                DraftQuestion {
                    text: format!("Question {i} on {}?", snippet.title),
                    options: vec![QuizOption::new("A", "Right"), QuizOption::new("B", "Wrong")],
                    correct_option: "A".into(),
                    explanation: "Stated in the source.".into(),
                    source_resource_id: Some(snippet.resource_id.to_string()),
                    citation,
                }
            })
            .collect())
    }
}

async fn seed(store: &TursoStore) {
    store
        .upsert_skill(&Skill::new("syntax", "Python syntax", "python-syntax"))
        .await
        .unwrap();
    store
        .upsert_skill(&Skill::new("control", "Python control flow", "python-control-flow"))
        .await
        .unwrap();
    store
        .insert_prerequisite(&PrerequisiteEdge::new("syntax", "control"))
        .await
        .unwrap();

    let resources = [
        Resource::new("py-syntax", "Python syntax tour", "https://example.com/py/syntax")
            .with_description("Learn Python basics: syntax, indentation and variables")
            .with_duration(120)
            .with_skills(["syntax"])
            .with_content_pointer("py-syntax.txt"),
        Resource::new("py-control", "Python control flow", "https://example.com/py/control")
            .with_description("Learn Python basics: loops and conditionals")
            .with_duration(90)
            .with_skills(["control"])
            .with_content_pointer("py-control.txt"),
        Resource::new("kafka-acme", "Kafka partitioning at Acme", "https://acme.example.com/kafka")
            .with_description("kafka partitioning for acme engineers")
            .with_duration(30)
            .with_tenant(TenantId::new("acme")),
        Resource::new("kafka-global", "Kafka partitioning explained", "https://example.com/kafka")
            .with_description("kafka partitioning basics")
            .with_duration(25),
        Resource::new("kafka-other", "Kafka partitioning internals", "https://other.example.com/kafka")
            .with_description("kafka partitioning deep dive")
            .with_duration(40)
            .with_tenant(TenantId::new("other-tenant")),
    ];
    for resource in &resources {
        store.upsert_resource(resource).await.unwrap();
    }
}

/// The three services wired to one in-memory store, plus a gateway in front of them.
pub struct Stack {
    pub gateway: SocketAddr,
    pub store: Arc<TursoStore>,
    http: reqwest::Client,
}

impl Stack {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(tune: impl FnOnce(&mut GatewayConfig)) -> Self {
        let store = Arc::new(TursoStore::new_memory().await.unwrap());
        seed(&store).await;

        let embedder = Arc::new(HashingEmbedder::default());
        let index = MemoryIndex::from_catalog(store.as_ref(), embedder.as_ref())
            .await
            .unwrap();
        let pipeline = RetrievalPipeline::new(embedder, Arc::new(index)).with_ingest_queue(store.clone());
        let retrieval = spawn("retrieval", retrieval_router(Arc::new(pipeline))).await;

        let finder = RetrievalApi::new(DownstreamClient::new("retrieval", url(retrieval), fast_retry()));
        let planner = Planner::new(store.clone(), store.clone(), Arc::new(finder), PlannerConfig::default());
        let planner = spawn("planner", planner_router(Arc::new(planner))).await;

        let snippets = MemorySnippetStore::new();
        snippets.insert("py-syntax.txt", SYNTAX_TEXT).await;
        snippets.insert("py-control.txt", CONTROL_TEXT).await;
        let engine = QuizEngine::new(
            store.clone(),
            Arc::new(snippets),
            Arc::new(FirstSentenceGenerator),
            store.clone(),
            QuizConfig::default(),
        );
        let quiz = spawn("quiz", quiz_router(Arc::new(engine))).await;

        let mut config = GatewayConfig {
            retrieval_url: url(retrieval),
            planner_url: url(planner),
            quiz_url: url(quiz),
            request_timeout_secs: 10,
            retry: fast_retry(),
        };
        tune(&mut config);
        let gateway = gateway(&config, AuthConfig::hs256(SECRET)).await;

        Self {
            gateway,
            store,
            http: reqwest::Client::new(),
        }
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.post(format!("{}{}", url(self.gateway), path))
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.get(format!("{}{}", url(self.gateway), path))
    }
}

/// Starts a gateway in front of the given downstream configuration.
pub async fn gateway(config: &GatewayConfig, auth: AuthConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = LearnpathServer::gateway(ServerConfig::new("127.0.0.1", addr.port()), config, auth);
    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

/// A downstream that answers every request with `status` and counts the hits.
pub async fn stub_service(status: StatusCode, body: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().fallback(any(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (status, [("content-type", "application/json")], body)
        }
    }));
    (spawn("stub", router).await, hits)
}

/// A downstream that sleeps before answering.
pub async fn slow_service(delay: Duration) -> SocketAddr {
    let router = Router::new().fallback(any(move || async move {
        tokio::time::sleep(delay).await;
        (StatusCode::OK, "{}")
    }));
    spawn("slow", router).await
}
