//! Typed configuration sections and the TOML/env loading path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the trainer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub tts: TtsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address for the realtime gateway
    pub addr: String,
    /// Directory for per-room session logs
    pub log_dir: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            log_dir: "./session_logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// OpenAI-compatible chat-completions endpoint base (".../v1" appended if missing)
    pub base_url: String,
    /// Fast reactive model (executor, chat gating, quiz)
    pub fast_model: String,
    /// Slow deliberative model (strategy generation, teaching)
    pub slow_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            fast_model: "gpt-4o-mini".to_string(),
            slow_model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSection {
    /// Speech-synthesis endpoint base (".../v1" appended if missing)
    pub base_url: String,
    pub model: String,
    pub voice: String,
    /// Size of the blocking synthesis worker pool
    pub workers: usize,
}

impl Default for TtsSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            workers: 4,
        }
    }
}

impl ServerConfig {
    /// Load configuration following the documented order. A missing file is
    /// not an error; an unreadable or malformed one is.
    pub fn load() -> Result<Self> {
        let mut config = if let Ok(path) = std::env::var("TEMCREW_CONFIG") {
            Self::from_file(&path)
                .with_context(|| format!("loading config from TEMCREW_CONFIG={}", path))?
        } else if Path::new("temcrew.toml").exists() {
            Self::from_file("temcrew.toml").context("loading ./temcrew.toml")?
        } else {
            tracing::info!("no config file found, using built-in defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path))?;
        let config: ServerConfig =
            toml::from_str(&raw).with_context(|| format!("parsing config file {}", path))?;
        tracing::info!(path = %path, "loaded configuration");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("TEMCREW_ADDR") {
            self.server.addr = addr;
        }
        if let Ok(dir) = std::env::var("TEMCREW_LOG_DIR") {
            self.server.log_dir = dir;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
    }

    /// LLM API key from the environment; empty means the agent will run on
    /// its deterministic fallbacks only.
    pub fn llm_api_key() -> String {
        std::env::var("OPENAI_API_KEY").unwrap_or_default()
    }

    /// TTS API key, falling back to the LLM key.
    pub fn tts_api_key() -> String {
        std::env::var("TTS_API_KEY").unwrap_or_else(|_| Self::llm_api_key())
    }
}

/// Normalize a provider base URL: force a scheme and a `/v1` suffix,
/// matching what OpenAI-compatible gateways expect.
pub fn normalize_base_url(base: &str) -> String {
    let mut url = base.trim().trim_end_matches('/').to_string();
    if !url.starts_with("http") {
        url = format!("https://{}", url);
    }
    if !url.ends_with("/v1") {
        url.push_str("/v1");
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let c = ServerConfig::default();
        assert_eq!(c.server.addr, "0.0.0.0:8080");
        assert!(c.tts.workers > 0);
        assert_ne!(c.llm.fast_model, c.llm.slow_model);
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("api.example.com"), "https://api.example.com/v1");
        assert_eq!(
            normalize_base_url("https://api.example.com/"),
            "https://api.example.com/v1"
        );
        assert_eq!(
            normalize_base_url("https://api.example.com/v1"),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: ServerConfig = toml::from_str(
            r#"
            [server]
            addr = "127.0.0.1:9000"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.addr, "127.0.0.1:9000");
        assert_eq!(parsed.server.log_dir, "./session_logs");
        assert_eq!(parsed.llm.fast_model, "gpt-4o-mini");
    }
}
