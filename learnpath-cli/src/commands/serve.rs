//! `learnpath serve` runs one role, or all four in one process.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use learnpath_models::auth::CredentialStore;
use learnpath_models::providers::{DeepInfraProvider, OpenAiCompatProvider};
use learnpath_planner::Planner;
use learnpath_quiz::{HttpSnippetStore, ModelQuestionGenerator, QuizEngine};
use learnpath_retrieval::{
    Embedder, HashingEmbedder, MemoryIndex, ModelEmbedder, ModelReranker, QdrantIndex, RetrievalPipeline,
    VectorIndex,
};
use learnpath_server::client::{DownstreamClient, RetrievalApi};
use learnpath_server::{GatewayConfig, LearnpathServer, ServerConfig, planner_router, quiz_router, retrieval_router};
use learnpath_store::TursoStore;
use tracing::{info, warn};

use super::open_store;
use crate::config::{Config, IndexBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Public API with authentication and orchestration
    Gateway,
    /// Embedding, vector search and reranking
    Retrieval,
    /// Learning plan construction
    Planner,
    /// Grounded quiz generation and grading
    Quiz,
    /// Every role in one process, wired over loopback
    All,
}

impl Role {
    pub fn service_name(self) -> &'static str {
        match self {
            Role::Gateway | Role::All => "learnpath-gateway",
            Role::Retrieval => "learnpath-retrieval",
            Role::Planner => "learnpath-planner",
            Role::Quiz => "learnpath-quiz",
        }
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Role to run
    #[arg(value_enum, default_value_t = Role::All)]
    pub role: Role,

    /// Host to bind to (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides config; single roles only)
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub async fn run(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if args.port.is_some() && args.role == Role::All {
        bail!("--port cannot be used with `all`; set the per-role ports in [server]");
    }

    match args.role {
        Role::Gateway => run_gateway(&config, args.port).await,
        Role::Retrieval => {
            let store = open_store(&config.store).await?;
            run_retrieval(&config, store, args.port).await
        }
        Role::Planner => {
            let store = open_store(&config.store).await?;
            run_planner(&config, store, args.port).await
        }
        Role::Quiz => {
            let store = open_store(&config.store).await?;
            run_quiz(&config, store, args.port).await
        }
        Role::All => run_all(config).await,
    }
}

fn listen(config: &Config, port: u16) -> ServerConfig {
    ServerConfig::new(config.server.host.clone(), port)
}

async fn run_all(mut config: Config) -> Result<()> {
    let loopback = |port: u16| format!("http://127.0.0.1:{port}");
    config.gateway.retrieval_url = loopback(config.server.retrieval_port);
    config.gateway.planner_url = loopback(config.server.planner_port);
    config.gateway.quiz_url = loopback(config.server.quiz_port);
    info!(
        retrieval = %config.gateway.retrieval_url,
        planner = %config.gateway.planner_url,
        quiz = %config.gateway.quiz_url,
        "running all roles in one process"
    );

    let store = open_store(&config.store).await?;
    tokio::try_join!(
        run_retrieval(&config, store.clone(), None),
        run_planner(&config, store.clone(), None),
        run_quiz(&config, store, None),
        run_gateway(&config, None),
    )?;
    Ok(())
}

async fn run_gateway(config: &Config, port: Option<u16>) -> Result<()> {
    if !config.auth.allow_anonymous && config.auth.secret.is_none() && config.auth.jwks_url.is_none() {
        warn!("bearer tokens are decoded without signature checks; set LEARNPATH_JWT_SECRET or auth.jwks_url");
    }
    let listen = listen(config, port.unwrap_or(config.server.gateway_port));
    LearnpathServer::gateway(listen, &config.gateway, config.auth.clone())
        .run()
        .await
        .context("gateway stopped")
}

async fn run_retrieval(config: &Config, store: Arc<TursoStore>, port: Option<u16>) -> Result<()> {
    let pipeline = build_pipeline(config, store).await?;
    let listen = listen(config, port.unwrap_or(config.server.retrieval_port));
    LearnpathServer::new("retrieval", listen, retrieval_router(Arc::new(pipeline)))
        .run()
        .await
        .context("retrieval service stopped")
}

async fn build_pipeline(config: &Config, store: Arc<TursoStore>) -> Result<RetrievalPipeline> {
    let credentials = CredentialStore::new();
    let deepinfra = credentials
        .find("deepinfra")
        .map(|key| Arc::new(DeepInfraProvider::new(Some(key))));

    let embedder: Arc<dyn Embedder> = match &deepinfra {
        Some(provider) => Arc::new(ModelEmbedder::new(provider.clone(), &config.models.embedding_model)),
        None => {
            warn!("DEEPINFRA_API_KEY not set; using the offline hashing embedder without reranking");
            Arc::new(HashingEmbedder::new(config.retrieval.hashing_dimensions))
        }
    };

    let index: Arc<dyn VectorIndex> = match config.retrieval.index {
        IndexBackend::Memory => {
            let index = MemoryIndex::from_catalog(store.as_ref(), embedder.as_ref())
                .await
                .context("failed to index the resource catalog")?;
            Arc::new(index)
        }
        IndexBackend::Qdrant => Arc::new(QdrantIndex::new(
            config.retrieval.qdrant.clone(),
            credentials.find("qdrant"),
        )),
    };

    let mut pipeline = RetrievalPipeline::new(embedder, index).with_ingest_queue(store);
    if let Some(provider) = deepinfra {
        pipeline = pipeline.with_reranker(Arc::new(ModelReranker::new(provider, &config.models.rerank_model)));
    }
    Ok(pipeline)
}

async fn run_planner(config: &Config, store: Arc<TursoStore>, port: Option<u16>) -> Result<()> {
    let finder = Arc::new(retrieval_client(&config.gateway));
    let planner = Planner::new(store.clone(), store, finder, config.planner.clone());
    let listen = listen(config, port.unwrap_or(config.server.planner_port));
    LearnpathServer::new("planner", listen, planner_router(Arc::new(planner)))
        .run()
        .await
        .context("planner service stopped")
}

/// The planner reaches retrieval over HTTP, with the gateway's retry schedule.
fn retrieval_client(gateway: &GatewayConfig) -> RetrievalApi {
    RetrievalApi::new(DownstreamClient::new(
        "retrieval",
        gateway.retrieval_url.clone(),
        gateway.retry.clone(),
    ))
}

async fn run_quiz(config: &Config, store: Arc<TursoStore>, port: Option<u16>) -> Result<()> {
    let credentials = CredentialStore::new();
    let key = credentials.find("openrouter");
    if key.is_none() {
        warn!("OPENROUTER_API_KEY not set; quiz generation will fail until it is");
    }
    let provider = Arc::new(OpenAiCompatProvider::openrouter(key));
    let generator = ModelQuestionGenerator::new(provider, &config.models.quiz_model)
        .with_temperature(config.models.quiz_temperature);
    let snippets = HttpSnippetStore::new(&config.quiz.snippets);

    let engine = QuizEngine::new(
        store.clone(),
        Arc::new(snippets),
        Arc::new(generator),
        store,
        config.quiz.engine.clone(),
    );
    let listen = listen(config, port.unwrap_or(config.server.quiz_port));
    LearnpathServer::new("quiz", listen, quiz_router(Arc::new(engine)))
        .run()
        .await
        .context("quiz service stopped")
}
