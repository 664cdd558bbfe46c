//! temcrew: real-time training server for two-pilot TEM exercises
//!
//! Each training room seats a Pilot-Flying and a Pilot-Monitoring - either
//! can be an AI - and runs three phases: pre-flight threat identification
//! with cross-verification, an instrument-monitoring flight with scripted
//! precursor/alert events, and emergency checklist execution.
//!
//! ## Architecture
//!
//! - **Gateway**: WebSocket transport, room-scoped broadcast, no domain logic
//! - **Rooms**: one actor task per room owns all state; single dispatch is
//!   the serialization boundary
//! - **Game Logic**: the only mutator - validate, mutate, log, broadcast
//! - **Simulation**: 10 Hz gauge/event tick multiplexed into the room actor
//! - **AI Agent**: dual-process Observe -> Strategize -> Execute pipeline on
//!   a fast/slow model pair, acting through the same commands as a human
//! - **TTS Fan-out**: blocking synthesis on worker threads, delivery on the
//!   event loop

pub mod agent;
pub mod config;
pub mod data;
pub mod game;
pub mod gateway;
pub mod llm;
pub mod logger;
pub mod rooms;
pub mod sim;
pub mod tts;
pub mod types;

// Re-export the shapes most callers touch
pub use agent::{AgentModels, AgentPacing};
pub use config::ServerConfig;
pub use game::GameError;
pub use gateway::{create_app, GatewayState};
pub use llm::ChatModel;
pub use rooms::{RoomCommand, RoomHandle, RoomStore};
pub use types::{Actor, GameMode, Phase, PlayerRequest, Role};
