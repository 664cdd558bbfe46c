//! Shared data structures for the TEM training session coordinator
//!
//! - `game`: roles, phases, actors, player requests, chat records
//! - `scenario`: read-only registry record shapes (threats, events, gauges, QRH)
//! - `ai`: the Observation -> Strategy -> Action pipeline types

mod ai;
mod game;
mod scenario;

pub use ai::*;
pub use game::*;
pub use scenario::*;
