//! Validation taxonomy for game-logic operations
//!
//! Everything here except `LogWrite` is a local validation failure: state is
//! unchanged, the caller gets an `error_msg`, and the attempt is logged with
//! a tag. `LogWrite` is fatal for the room.

use thiserror::Error;

use crate::types::Role;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("action requires the {0} role")]
    WrongRole(Role),

    #[error("unknown threat keyword '{0}'")]
    UnknownThreat(String),

    #[error("threat '{0}' has already been resolved")]
    ThreatAlreadyResolved(String),

    #[error("unknown option '{option}' for threat '{keyword}'")]
    UnknownOption { keyword: String, option: String },

    #[error("no decision is awaiting verification")]
    NoPendingDecision,

    #[error("unknown quiz question '{0}'")]
    UnknownQuestion(String),

    #[error("unknown gauge '{0}'")]
    UnknownGauge(String),

    #[error("unknown checklist '{0}'")]
    UnknownChecklist(String),

    #[error("checklist '{0}' has already been used")]
    ChecklistAlreadyUsed(String),

    #[error("checklist item {0} is out of range")]
    ItemOutOfRange(usize),

    #[error("no flight is in progress")]
    NoActiveFlight,

    #[error("room is full")]
    RoomFull,

    #[error("the {0} seat is already taken")]
    SeatTaken(Role),

    #[error("session log write failed: {0}")]
    LogWrite(String),
}

impl GameError {
    /// Fatal errors abort the room rather than bouncing back to the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GameError::LogWrite(_))
    }
}
