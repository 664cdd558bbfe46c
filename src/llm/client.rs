//! Streaming chat-completions client with latency statistics

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tokio::sync::Mutex;

use super::ChatModel;
use crate::config::normalize_base_url;

/// Per-model latency and failure counters.
#[derive(Debug, Default, Clone)]
pub struct LlmStats {
    pub request_count: u64,
    pub failure_count: u64,
    pub total_latency_ms: f64,
}

impl LlmStats {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.total_latency_ms / self.request_count as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// One configured model endpoint over the shared HTTP pool.
pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    config: LlmClientConfig,
    stats: Mutex<LlmStats>,
}

impl LlmClient {
    pub fn new(http: reqwest::Client, config: LlmClientConfig) -> Self {
        let endpoint = format!("{}/chat/completions", normalize_base_url(&config.base_url));
        Self {
            http,
            endpoint,
            config,
            stats: Mutex::new(LlmStats::default()),
        }
    }

    pub async fn stats(&self) -> LlmStats {
        self.stats.lock().await.clone()
    }

    async fn record(&self, start: Instant, failed: bool) {
        let mut stats = self.stats.lock().await;
        stats.request_count += 1;
        stats.total_latency_ms += start.elapsed().as_secs_f64() * 1000.0;
        if failed {
            stats.failure_count += 1;
        }
    }

    /// Issue one streaming request and accumulate every delta into the full
    /// reply text.
    async fn chat_streaming(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": true,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM returned {}: {}", status, truncate(&text, 200)));
        }

        let mut full = String::new();
        let mut buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("LLM stream interrupted")?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE frames are newline-delimited `data: {...}` lines.
            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                let line = line.trim();
                let Some(payload) = line.strip_prefix("data:") else {
                    continue;
                };
                let payload = payload.trim();
                if payload.is_empty() || payload == "[DONE]" {
                    continue;
                }
                match serde_json::from_str::<StreamChunk>(payload) {
                    Ok(parsed) => {
                        if let Some(delta) = parsed.first_delta() {
                            full.push_str(delta);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping undecodable stream chunk");
                    }
                }
            }
        }

        Ok(full)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.chat_streaming(prompt).await;
        self.record(start, result.is_err()).await;

        match &result {
            Ok(text) => tracing::debug!(
                model = %self.config.model,
                latency_ms = start.elapsed().as_millis() as u64,
                chars = text.len(),
                "chat completion finished"
            ),
            Err(e) => tracing::warn!(
                model = %self.config.model,
                error = %e,
                "chat completion failed"
            ),
        }
        result
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

impl StreamChunk {
    fn first_delta(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_chunk_decoding() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"hel"},"index":0}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.first_delta(), Some("hel"));

        let done: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(done.first_delta(), None);
    }

    #[test]
    fn test_endpoint_normalization() {
        let client = LlmClient::new(
            reqwest::Client::new(),
            LlmClientConfig {
                base_url: "api.example.com".into(),
                api_key: String::new(),
                model: "m".into(),
                temperature: 0.7,
                max_tokens: 100,
            },
        );
        assert_eq!(client.endpoint, "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn test_stats_average() {
        let mut stats = LlmStats::default();
        assert_eq!(stats.avg_latency_ms(), 0.0);
        stats.request_count = 2;
        stats.total_latency_ms = 300.0;
        assert_eq!(stats.avg_latency_ms(), 150.0);
    }
}
