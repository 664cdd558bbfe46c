//! Per-room mutable state
//!
//! `RoomState` is exclusively owned by the room's actor task; all mutation
//! flows through the game-logic operations in `crate::game`. Nothing here is
//! shared or locked - the single-dispatch loop is the serialization boundary.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use crate::data;
use crate::types::{
    ChatMessage, FlightScenario, GameMode, GaugeBaseline, Phase, Role, SessionId, SopGuide,
};

/// Hard cap on seated users per room.
pub const ROOM_CAPACITY: usize = 2;

/// Bounded chat history length; oldest entries are evicted beyond this.
pub const CHAT_HISTORY_CAP: usize = 100;

/// One seated participant (human or AI).
#[derive(Debug, Clone, PartialEq)]
pub struct SeatedUser {
    pub name: String,
    pub role: Role,
    pub is_ai: bool,
}

// ============================================================================
// Phase 1 sub-state
// ============================================================================

/// A PF decision waiting for (or under) PM verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingDecision {
    pub keyword: String,
    pub option_id: String,
    pub option_text: String,
    pub is_correct: bool,
    pub pf_name: String,
    pub sop: SopGuide,
}

/// Outcome class of a verified threat decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionResult {
    /// PF correct, PM approved
    Success,
    /// PF correct, PM rejected
    PmError,
    /// PF wrong, PM approved - the double failure
    CriticalError,
    /// PF wrong, PM rejected - the CRM catch
    PmCatch,
}

impl DecisionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionResult::Success => "success",
            DecisionResult::PmError => "pm_error",
            DecisionResult::CriticalError => "critical_error",
            DecisionResult::PmCatch => "pm_catch",
        }
    }

    /// Banner color for the result broadcast.
    pub fn color(&self) -> &'static str {
        match self {
            DecisionResult::Success => "green",
            DecisionResult::PmError => "orange",
            DecisionResult::CriticalError => "red",
            DecisionResult::PmCatch => "yellow",
        }
    }
}

/// Resolved outcome of one threat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandledThreat {
    pub pf_choice: String,
    pub pf_correct: bool,
    pub pm_approved: bool,
    pub result: DecisionResult,
    pub score_delta: i32,
}

/// One scored quiz answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizResult {
    pub question_id: String,
    pub chosen: String,
    pub correct: bool,
    pub score_delta: i32,
}

/// Threat-identification and decision-queue state.
#[derive(Debug, Default)]
pub struct Phase1State {
    /// Keywords the PF has marked as under-decision
    pub identified: HashSet<String>,
    /// keyword -> resolved outcome
    pub handled_threats: HashMap<String, HandledThreat>,
    /// The decision currently before the PM, if any
    pub pending_decision: Option<PendingDecision>,
    /// FIFO of decisions awaiting promotion; an AI PF can outrun a human PM
    pub decision_queue: VecDeque<PendingDecision>,
    pub quiz_results: Vec<QuizResult>,
}

// ============================================================================
// Phase 2 sub-state
// ============================================================================

/// When a scripted event was first caught.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub stage: DetectionStage,
    pub at_s: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStage {
    /// Caught on the gauges before the alert fired
    Precursor,
    /// Credited at the alert itself
    Alert,
}

/// Live flight-simulation state for one room.
#[derive(Debug)]
pub struct Phase2State {
    pub scenario: &'static FlightScenario,
    pub sim_start: Instant,
    /// gauge id (fuel uses `_left`/`_right` sub-keys) -> current value
    pub gauge_states: HashMap<String, f64>,
    /// Gauge ids the crew has tagged for monitoring
    pub monitored_gauges: HashSet<String>,
    /// event id -> first detection; written exactly once per event
    pub event_detections: HashMap<String, Detection>,
    /// Events whose alert banner has been broadcast
    pub alerted_events: HashSet<String>,
    /// Events whose one-time stabilized notice has been broadcast
    pub ended_events: HashSet<String>,
    /// Set once `mission_complete` has been emitted
    pub finished: bool,
}

impl Phase2State {
    pub fn new(scenario: &'static FlightScenario) -> Self {
        Self {
            scenario,
            sim_start: Instant::now(),
            gauge_states: initial_gauge_states(),
            monitored_gauges: HashSet::new(),
            event_detections: HashMap::new(),
            alerted_events: HashSet::new(),
            ended_events: HashSet::new(),
            finished: false,
        }
    }
}

/// Gauge bank at its baselines, fuel split into per-tank keys.
pub fn initial_gauge_states() -> HashMap<String, f64> {
    let mut states = HashMap::new();
    for gauge in &data::registry().gauges {
        match gauge.baseline {
            GaugeBaseline::Single(v) => {
                states.insert(gauge.id.clone(), v);
            }
            GaugeBaseline::Split { left, right } => {
                states.insert(format!("{}_left", gauge.id), left);
                states.insert(format!("{}_right", gauge.id), right);
            }
        }
    }
    states
}

// ============================================================================
// Phase 3 sub-state
// ============================================================================

/// QRH checklist execution state.
#[derive(Debug, Default)]
pub struct Phase3State {
    pub used_qrh: HashSet<String>,
    pub current_qrh: Option<String>,
    pub checked_items: HashSet<usize>,
    pub active_checklist_len: usize,
}

// ============================================================================
// Room state
// ============================================================================

/// The unit of state for one training session.
#[derive(Debug)]
pub struct RoomState {
    pub id: String,
    pub mode: GameMode,
    pub phase: Phase,
    pub score: i32,
    pub users: HashMap<SessionId, SeatedUser>,
    pub session_start: Instant,
    pub chat_history: VecDeque<ChatMessage>,
    /// Sessions that have confirmed readiness for the flight phase
    pub ready_for_next: HashSet<SessionId>,
    pub phase1: Phase1State,
    pub phase2: Option<Phase2State>,
    pub phase3: Phase3State,
}

impl RoomState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: GameMode::default(),
            phase: Phase::Waiting,
            score: 0,
            users: HashMap::new(),
            session_start: Instant::now(),
            chat_history: VecDeque::new(),
            ready_for_next: HashSet::new(),
            phase1: Phase1State::default(),
            phase2: None,
            phase3: Phase3State::default(),
        }
    }

    pub fn role_taken(&self, role: Role) -> bool {
        self.users.values().any(|u| u.role == role)
    }

    /// The session seated in `role`, if any.
    pub fn seat(&self, role: Role) -> Option<(&SessionId, &SeatedUser)> {
        self.users.iter().find(|(_, u)| u.role == role)
    }

    pub fn human_count(&self) -> usize {
        self.users.values().filter(|u| !u.is_ai).count()
    }

    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.values().map(|u| u.name.clone()).collect();
        names.sort();
        names
    }

    /// Append a chat message, evicting the oldest beyond the cap.
    pub fn push_chat(&mut self, message: ChatMessage) {
        self.chat_history.push_back(message);
        while self.chat_history.len() > CHAT_HISTORY_CAP {
            self.chat_history.pop_front();
        }
    }

    /// The last `n` chat messages, oldest first.
    pub fn chat_tail(&self, n: usize) -> Vec<ChatMessage> {
        self.chat_history
            .iter()
            .rev()
            .take(n)
            .rev()
            .cloned()
            .collect()
    }
}

// ============================================================================
// Snapshots for the AI observer
// ============================================================================

/// Read-only projection of room state handed to the AI observer. Built inside
/// the room actor, so it is always internally consistent.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub room: String,
    pub phase: Phase,
    pub score: i32,
    pub handled_threats: Vec<(String, DecisionResult)>,
    pub pending_decision: Option<PendingDecision>,
    pub quiz_answered: usize,
    pub chat_tail: Vec<ChatMessage>,
    pub gauge_states: HashMap<String, f64>,
    pub monitored_gauges: Vec<String>,
    pub event_detections: HashMap<String, Detection>,
    pub used_qrh: Vec<String>,
    pub current_qrh: Option<String>,
    pub checked_items: usize,
    pub active_checklist_len: usize,
}

impl StateSnapshot {
    pub fn of(state: &RoomState) -> Self {
        Self {
            room: state.id.clone(),
            phase: state.phase,
            score: state.score,
            handled_threats: state
                .phase1
                .handled_threats
                .iter()
                .map(|(k, v)| (k.clone(), v.result))
                .collect(),
            pending_decision: state.phase1.pending_decision.clone(),
            quiz_answered: state.phase1.quiz_results.len(),
            chat_tail: state.chat_tail(5),
            gauge_states: state
                .phase2
                .as_ref()
                .map(|p| p.gauge_states.clone())
                .unwrap_or_default(),
            monitored_gauges: state
                .phase2
                .as_ref()
                .map(|p| p.monitored_gauges.iter().cloned().collect())
                .unwrap_or_default(),
            event_detections: state
                .phase2
                .as_ref()
                .map(|p| p.event_detections.clone())
                .unwrap_or_default(),
            used_qrh: state.phase3.used_qrh.iter().cloned().collect(),
            current_qrh: state.phase3.current_qrh.clone(),
            checked_items: state.phase3.checked_items.len(),
            active_checklist_len: state.phase3.active_checklist_len,
        }
    }
}
