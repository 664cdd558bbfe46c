//! Hook channel from the room to its AI agents
//!
//! Game logic and the simulation loop fire these instead of client messages
//! when the recipient seat is an AI. Each AI seat gets its own unbounded
//! channel; events are processed sequentially by the agent, which preserves
//! submission order for the verify pipeline.

use std::collections::HashMap;
use tokio::sync::mpsc;

use super::state::PendingDecision;
use crate::types::{AlertSeverity, Role};

/// One trigger delivered to an AI agent.
#[derive(Debug, Clone)]
pub enum HookEvent {
    Phase1Start,
    /// A threat was marked under-decision by this AI PF
    PfDecisionRequest { keyword: String },
    /// A decision was promoted and awaits this AI PM's verification
    PmVerifyRequest { decision: PendingDecision },
    /// The emergency quiz has been shown to the room
    QuizDelivered,
    /// A human tagged a gauge; the AI teaches from it
    GaugeMonitoredByHuman { gauge_id: String, value: Option<f64> },
    /// A scripted event reached its alert window
    EventAlert {
        event_id: String,
        message: String,
        severity: AlertSeverity,
    },
    /// A checklist is on screen; the AI works through its items
    ChecklistShown {
        key: String,
        title: String,
        item_count: usize,
    },
    /// A human chat message the AI may choose to answer
    Chat {
        sender: String,
        sender_role: Role,
        message: String,
    },
}

/// Registry of hook senders, one per AI-occupied seat.
#[derive(Debug, Default)]
pub struct AgentHooks {
    senders: HashMap<Role, mpsc::UnboundedSender<HookEvent>>,
}

impl AgentHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hook channel for an AI seat, returning the receiver the
    /// agent task will consume.
    pub fn register(&mut self, role: Role) -> mpsc::UnboundedReceiver<HookEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(role, tx);
        rx
    }

    /// Deliver an event to the agent in `role`, if one is registered. A
    /// closed channel means the agent is gone; the event is dropped.
    pub fn notify(&self, role: Role, event: HookEvent) {
        if let Some(tx) = self.senders.get(&role) {
            if tx.send(event).is_err() {
                tracing::debug!(role = %role, "agent hook channel closed, event dropped");
            }
        }
    }

    /// Deliver an event to every registered agent.
    pub fn notify_all(&self, event: HookEvent) {
        for (role, tx) in &self.senders {
            if tx.send(event.clone()).is_err() {
                tracing::debug!(role = %role, "agent hook channel closed, event dropped");
            }
        }
    }

    pub fn has_agent(&self, role: Role) -> bool {
        self.senders.contains_key(&role)
    }
}
