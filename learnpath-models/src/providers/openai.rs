//! OpenAI-compatible chat and embeddings provider.
//!
//! Works against any `/chat/completions` endpoint that speaks the OpenAI wire format,
//! such as OpenRouter or DeepInfra's `/v1/openai` surface.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, Message, ModelProvider, Usage,
    api_error,
};
use crate::auth::ApiKey;
use crate::{Error, Result};

/// OpenRouter's API base URL.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ReplyUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsReply {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<ApiKey>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: Option<ApiKey>) -> Self {
        Self::with_timeout(name, base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn openrouter(api_key: Option<ApiKey>) -> Self {
        Self::new("openrouter", OPENROUTER_BASE_URL, api_key)
    }

    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<ApiKey>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(api_error(&self.name, response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        debug!(provider = %self.name, model = %request.model, "chat completion");
        let body = CompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let reply: CompletionReply = self
            .post("chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| Error::ProviderApi(format!("malformed completion response: {e}")))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::ProviderApi("completion had no content".to_string()))?;
        let usage = reply
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ChatResponse { content, usage })
    }

    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse> {
        let body = EmbeddingsBody {
            model: &request.model,
            input: &request.texts,
        };
        let mut reply: EmbeddingsReply = self
            .post("embeddings", &body)
            .await?
            .json()
            .await
            .map_err(|e| Error::ProviderApi(format!("malformed embedding response: {e}")))?;
        reply.data.sort_by_key(|item| item.index);

        Ok(EmbedResponse {
            embeddings: reply.data.into_iter().map(|item| item.embedding).collect(),
        })
    }
}
