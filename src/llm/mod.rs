//! Dual-model LLM client
//!
//! Two OpenAI-compatible chat models share one HTTP connection pool:
//!
//! - **Fast model**: reactive, tightly-scoped questions (quiz answers, chat
//!   gating, QRH matching). Target latency a second or two.
//! - **Slow model**: deliberative strategy generation and teaching replies.
//!
//! Responses stream as SSE deltas and are accumulated to completion before
//! any parsing - partial JSON is not actionable. The [`ChatModel`] trait is
//! the seam the agent tests script against.

mod client;

pub use client::{LlmClient, LlmClientConfig, LlmStats};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A chat-completion backend: one prompt in, the full reply text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, prompt: &str) -> Result<String>;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;
}

/// Backend used when no API key is configured: every call fails, which
/// drives the agent onto its deterministic fallbacks instead of blocking.
pub struct NullModel;

#[async_trait]
impl ChatModel for NullModel {
    async fn chat(&self, _prompt: &str) -> Result<String> {
        Err(anyhow::anyhow!("no LLM provider configured"))
    }

    fn model_name(&self) -> &str {
        "null"
    }
}

/// Build the fast/slow pair from configuration, sharing one `reqwest` pool
/// across all rooms. With no API key, both seats get the [`NullModel`].
pub fn build_models(
    llm: &crate::config::LlmSection,
    api_key: &str,
) -> Result<(Arc<dyn ChatModel>, Arc<dyn ChatModel>)> {
    if api_key.is_empty() {
        tracing::warn!("no LLM API key set; AI seats will use deterministic fallbacks only");
        return Ok((Arc::new(NullModel), Arc::new(NullModel)));
    }

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(llm.timeout_secs))
        .build()?;

    let fast = LlmClient::new(
        http.clone(),
        LlmClientConfig {
            base_url: llm.base_url.clone(),
            api_key: api_key.to_string(),
            model: llm.fast_model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        },
    );
    let slow = LlmClient::new(
        http,
        LlmClientConfig {
            base_url: llm.base_url.clone(),
            api_key: api_key.to_string(),
            model: llm.slow_model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        },
    );
    Ok((Arc::new(fast), Arc::new(slow)))
}
