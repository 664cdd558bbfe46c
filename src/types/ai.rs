//! AI pipeline data shapes: Observation -> Strategy -> Action
//!
//! The dual-process agent moves through these three stages for every hook it
//! handles. A `StrategyOutcome` distinguishes a successfully parsed slow-model
//! reply from the deterministic fallback path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::game::{Phase, PlayerRequest, Role};

/// Phase-specific projection of room state, produced without any LLM call.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub phase: Phase,
    pub role: Role,
    pub context: Map<String, Value>,
}

/// Structured recommendation inside a strategy reply
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Recommendation {
    pub action: String,
    pub confidence: String,
    pub reasoning: String,
}

/// Parsed slow-model output: deliberation plus a crew-style explanation
/// that is broadcast verbatim as a chat message.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Strategy {
    pub thinking: String,
    pub assessment: Map<String, Value>,
    pub recommendation: Recommendation,
    pub next_focus: String,
    pub explanation: String,
}

/// Result of a strategy-generation attempt. A network error, malformed JSON,
/// or an out-of-vocabulary recommendation all land in `Fallback`, and the
/// executor's conservative defaults apply - the session never blocks on a
/// misbehaving model.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    Parsed(Strategy),
    Fallback { reason: String },
}

impl StrategyOutcome {
    /// The explanation to speak to the crew, if the model produced one.
    pub fn explanation(&self) -> Option<&str> {
        match self {
            StrategyOutcome::Parsed(s) if !s.explanation.trim().is_empty() => {
                Some(s.explanation.trim())
            }
            _ => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StrategyOutcome::Fallback { .. })
    }
}

/// Executor output: a concrete game action, identical in shape to what a
/// human client would send.
#[derive(Debug, Clone)]
pub struct AgentAction {
    pub request: PlayerRequest,
    /// False when the action should be paced with a human-scale delay first.
    pub immediate: bool,
}

impl AgentAction {
    pub fn immediate(request: PlayerRequest) -> Self {
        Self {
            request,
            immediate: true,
        }
    }

    pub fn paced(request: PlayerRequest) -> Self {
        Self {
            request,
            immediate: false,
        }
    }
}
