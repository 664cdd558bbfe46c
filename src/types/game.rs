//! Core session types: roles, phases, actors, chat records

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle identifying one connected client session.
pub type SessionId = Uuid;

// ============================================================================
// Roles and Modes
// ============================================================================

/// Cockpit role of a seated participant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "PF")]
    Pf,
    #[serde(rename = "PM")]
    Pm,
}

impl Role {
    /// The other seat in the cockpit.
    pub fn peer(&self) -> Role {
        match self {
            Role::Pf => Role::Pm,
            Role::Pm => Role::Pf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pf => "PF",
            Role::Pm => "PM",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Crew composition of the room
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Two human participants
    #[default]
    DualPlayer,
    /// One human, the other seat played by the AI agent
    SinglePlayer,
}

/// Session phase progression
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Waiting,
    Phase1,
    Phase2,
    Phase3,
    Ended,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Phase1 => "phase1",
            Phase::Phase2 => "phase2",
            Phase::Phase3 => "phase3",
            Phase::Ended => "ended",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Actors
// ============================================================================

/// The originator of a game action. Humans and AIs share this shape: the
/// game-logic layer cannot tell them apart except by `is_ai`, and AI actors
/// carry no client session handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    pub role: Role,
    pub is_ai: bool,
    pub session: Option<SessionId>,
}

impl Actor {
    pub fn human(name: impl Into<String>, role: Role, session: SessionId) -> Self {
        Self {
            name: name.into(),
            role,
            is_ai: false,
            session: Some(session),
        }
    }

    pub fn ai(role: Role) -> Self {
        Self {
            name: format!("AI {}", role),
            role,
            is_ai: true,
            session: None,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// A game action as issued by a player, human or AI. The gateway decodes
/// client frames into this shape; the AI executor produces the same shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerRequest {
    IdentifyThreat { keyword: String },
    SubmitDecision { keyword: String, option_id: String },
    VerifyDecision { approved: bool },
    StartQuiz,
    SubmitQuizAnswer { question_id: String, answer: String },
    RequestPhase2,
    MonitorGauge { gauge_id: String },
    SelectQrh { key: String },
    CheckItem { index: usize },
    SendChat { message: String, tts: bool },
}

impl PlayerRequest {
    /// Short action name used in rejection log records.
    pub fn action_name(&self) -> &'static str {
        match self {
            PlayerRequest::IdentifyThreat { .. } => "pf_identify_threat",
            PlayerRequest::SubmitDecision { .. } => "pf_submit_decision",
            PlayerRequest::VerifyDecision { .. } => "pm_verify_decision",
            PlayerRequest::StartQuiz => "start_emergency_quiz",
            PlayerRequest::SubmitQuizAnswer { .. } => "submit_quiz_answer",
            PlayerRequest::RequestPhase2 => "req_phase_2",
            PlayerRequest::MonitorGauge { .. } => "monitor_gauge",
            PlayerRequest::SelectQrh { .. } => "select_qrh",
            PlayerRequest::CheckItem { .. } => "check_item",
            PlayerRequest::SendChat { .. } => "send_chat_message",
        }
    }
}

// ============================================================================
// Chat
// ============================================================================

/// One chat record in the room's bounded history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub sender_name: String,
    pub sender_role: Role,
    pub body: String,
    pub timestamp_iso: String,
    pub is_ai: bool,
    pub tts_requested: bool,
}

impl ChatMessage {
    pub fn now(actor: &Actor, body: impl Into<String>, tts_requested: bool) -> Self {
        Self {
            sender_name: actor.name.clone(),
            sender_role: actor.role,
            body: body.into(),
            timestamp_iso: Utc::now().to_rfc3339(),
            is_ai: actor.is_ai,
            tts_requested,
        }
    }
}
