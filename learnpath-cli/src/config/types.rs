//! Shape of `learnpath.toml`. Every field has a default, so any subset may be written.

use learnpath_core::AuthConfig;
use learnpath_observe::TracerConfig;
use learnpath_planner::PlannerConfig;
use learnpath_quiz::{QuizConfig, SnippetStoreConfig};
use learnpath_retrieval::QdrantConfig;
use learnpath_server::GatewayConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub retrieval: RetrievalConfig,
    pub models: ModelsConfig,
    pub planner: PlannerConfig,
    pub quiz: QuizSection,
    pub store: StoreConfig,
    pub logging: TracerConfig,
}

/// Listen addresses, one port per role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub gateway_port: u16,
    pub retrieval_port: u16,
    pub planner_port: u16,
    pub quiz_port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            gateway_port: 8000,
            retrieval_port: 8001,
            planner_port: 8002,
            quiz_port: 8003,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Cosine index built from the resource catalog at startup.
    #[default]
    Memory,
    Qdrant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub index: IndexBackend,
    pub qdrant: QdrantConfig,
    /// Dimensions of the offline hashing embedder used when no embedding key is set.
    pub hashing_dimensions: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index: IndexBackend::Memory,
            qdrant: QdrantConfig::default(),
            hashing_dimensions: 256,
        }
    }
}

/// Hosted model names. Keys come from the environment only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub embedding_model: String,
    pub rerank_model: String,
    pub quiz_model: String,
    pub quiz_temperature: f32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            embedding_model: "intfloat/multilingual-e5-large".to_string(),
            rerank_model: "BAAI/bge-reranker-v2-m3".to_string(),
            quiz_model: "openai/gpt-4o-mini".to_string(),
            quiz_temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSection {
    #[serde(flatten)]
    pub engine: QuizConfig,
    pub snippets: SnippetStoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// File path, `:memory:`, or a `libsql://` URL for a remote database.
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "learnpath.db".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn is_remote(&self) -> bool {
        ["libsql://", "https://", "http://"]
            .iter()
            .any(|scheme| self.database.starts_with(scheme))
    }
}
