//! Server configuration
//!
//! Loaded from a TOML file with environment overrides, then frozen into a
//! process-wide `OnceLock`.
//!
//! ## Loading Order
//!
//! 1. `TEMCREW_CONFIG` environment variable (path to TOML file)
//! 2. `temcrew.toml` in the current working directory
//! 3. Built-in defaults
//!
//! API credentials never live in the file: `OPENAI_API_KEY` (LLM) and
//! `TTS_API_KEY` (falls back to the LLM key) come from the environment.
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere.

mod server_config;

pub use server_config::*;

use std::sync::OnceLock;

/// Global server configuration, initialized once at startup.
static SERVER_CONFIG: OnceLock<ServerConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored with a warning.
pub fn init(config: ServerConfig) {
    if SERVER_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once - ignoring");
    }
}

/// Get a reference to the global configuration, falling back to defaults if
/// `init()` was never called (unit tests take this path).
pub fn get() -> &'static ServerConfig {
    SERVER_CONFIG.get_or_init(ServerConfig::default)
}
