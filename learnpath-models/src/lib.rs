//! Model providers for learnpath.
//!
//! This crate provides:
//! - The [`ModelProvider`](providers::ModelProvider) trait for chat, embeddings and reranking
//! - An OpenAI-compatible chat/embeddings provider (OpenRouter and friends)
//! - A DeepInfra inference provider for embeddings and cross-encoder reranking
//! - Environment-backed API keys that never appear in logs

mod error;

pub mod auth;
pub mod providers;

pub use error::{Error, Result};
pub use providers::ModelProvider;
