//! temcrew server binary
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:8080, ./session_logs, config from ./temcrew.toml
//! temcrew
//!
//! # Overrides
//! temcrew --addr 127.0.0.1:9000 --log-dir /var/log/temcrew
//! ```
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY`: LLM provider credential (empty = deterministic AI)
//! - `TTS_API_KEY`: TTS provider credential (falls back to the LLM key)
//! - `TEMCREW_CONFIG`: path to the TOML config file
//! - `RUST_LOG`: logging filter (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use temcrew::agent::{AgentModels, AgentPacing};
use temcrew::config::{self, ServerConfig};
use temcrew::gateway::{create_app, GatewayState};
use temcrew::rooms::RoomStore;
use temcrew::tts::{HttpSynthesizer, TtsFanout};

#[derive(Parser, Debug)]
#[command(name = "temcrew")]
#[command(about = "Real-time training server for two-pilot TEM exercises")]
#[command(version)]
struct CliArgs {
    /// Override the gateway bind address
    #[arg(short, long)]
    addr: Option<String>,

    /// Override the session-log directory
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so RUST_LOG and credentials are visible below.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = CliArgs::parse();

    let mut server_config = ServerConfig::load().context("loading configuration")?;
    if let Some(addr) = args.addr {
        server_config.server.addr = addr;
    }
    if let Some(log_dir) = args.log_dir {
        server_config.server.log_dir = log_dir;
    }
    config::init(server_config);
    let cfg = config::get();

    // Warm the scenario registry and fail fast on an empty one.
    let registry = temcrew::data::registry();
    info!(
        threats = registry.phase1.threats.len(),
        flights = registry.flights.len(),
        checklists = registry.qrh.len(),
        "scenario registry loaded"
    );

    // Shared LLM pool for every room's agents.
    let (fast, slow) = temcrew::llm::build_models(&cfg.llm, &ServerConfig::llm_api_key())
        .context("building LLM clients")?;
    let models = AgentModels {
        fast,
        slow,
        pacing: AgentPacing::default(),
    };

    let store = RoomStore::new(&cfg.server.log_dir, models);

    let synthesizer = Arc::new(HttpSynthesizer::new(
        &cfg.tts.base_url,
        ServerConfig::tts_api_key(),
        cfg.tts.model.clone(),
    ));
    let tts = TtsFanout::spawn(
        synthesizer,
        cfg.tts.workers,
        cfg.tts.voice.clone(),
        Arc::clone(&store),
    );

    let app = create_app(GatewayState {
        store: Arc::clone(&store),
        tts,
    });

    let listener = tokio::net::TcpListener::bind(&cfg.server.addr)
        .await
        .with_context(|| format!("binding {}", cfg.server.addr))?;
    info!(addr = %cfg.server.addr, "temcrew gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    // Stop every live room at its next suspension point.
    store.shutdown_all();

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
