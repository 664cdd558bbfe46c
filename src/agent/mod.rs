//! Dual-process AI agent
//!
//! One agent task per AI-occupied seat, alive for the room's lifetime. It
//! consumes hook events from the room actor and runs each through the
//! Observe -> Strategize -> Execute pipeline, then issues the resulting
//! actions back through the same command queue a human client uses - the
//! game-logic layer cannot tell the difference.
//!
//! Events are handled strictly sequentially, which is what guarantees that
//! back-to-back verify requests are answered in submission order. Randomized
//! pacing keeps the agent at human tempo instead of machine tempo.

pub mod executor;
pub mod observer;
pub mod strategy;

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::data;
use crate::llm::ChatModel;
use crate::rooms::actor::RoomCommand;
use crate::rooms::hooks::HookEvent;
use crate::rooms::state::{PendingDecision, StateSnapshot};
use crate::types::{Actor, AgentAction, PlayerRequest, Role};

/// Delay between an action and the explanation chat that follows it, so the
/// action's result lands on screen first.
const EXPLANATION_LAG: Duration = Duration::from_millis(500);

/// The fast/slow model pair plus pacing, shared by every room's agents.
#[derive(Clone)]
pub struct AgentModels {
    pub fast: Arc<dyn ChatModel>,
    pub slow: Arc<dyn ChatModel>,
    pub pacing: AgentPacing,
}

/// Human-scale delay ranges in seconds: fast reactions and slow deliberation.
#[derive(Debug, Clone, Copy)]
pub struct AgentPacing {
    pub fast: (f64, f64),
    pub slow: (f64, f64),
}

impl Default for AgentPacing {
    fn default() -> Self {
        Self {
            fast: (1.0, 3.0),
            slow: (3.0, 6.0),
        }
    }
}

impl AgentPacing {
    /// Zero delays, for tests.
    pub fn instant() -> Self {
        Self {
            fast: (0.0, 0.0),
            slow: (0.0, 0.0),
        }
    }

    fn sample(range: (f64, f64)) -> Duration {
        let (lo, hi) = range;
        if hi <= lo {
            return Duration::from_secs_f64(lo.max(0.0));
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(lo..hi))
    }
}

/// Everything one agent task needs: its seat, its room's command queue, its
/// hook feed, and the models.
pub struct AgentSeat {
    pub room: String,
    pub role: Role,
    pub commands: mpsc::Sender<RoomCommand>,
    pub hooks: mpsc::UnboundedReceiver<HookEvent>,
    pub models: AgentModels,
}

/// Agent main loop: exits when the room actor drops the hook channel.
pub async fn run(mut seat: AgentSeat) {
    info!(room = %seat.room, role = %seat.role, "AI agent starting");
    while let Some(event) = seat.hooks.recv().await {
        seat.handle(event).await;
    }
    debug!(room = %seat.room, role = %seat.role, "AI agent stopped");
}

impl AgentSeat {
    async fn handle(&self, event: HookEvent) {
        match event {
            HookEvent::Phase1Start if self.role == Role::Pf => self.identify_all_threats().await,
            HookEvent::Phase1Start => {
                debug!(room = %self.room, "AI PM standing by for verifications");
            }
            HookEvent::PfDecisionRequest { keyword } if self.role == Role::Pf => {
                self.decide_threat(&keyword).await;
            }
            HookEvent::PmVerifyRequest { decision } if self.role == Role::Pm => {
                self.verify_decision(decision).await;
            }
            HookEvent::QuizDelivered if self.role == Role::Pm => self.answer_quiz().await,
            HookEvent::GaugeMonitoredByHuman { gauge_id, value } => {
                self.teach_gauge(&gauge_id, value).await;
            }
            HookEvent::EventAlert { message, .. } => self.respond_to_alert(&message).await,
            HookEvent::ChecklistShown { item_count, .. } => {
                self.execute_checklist(item_count).await;
            }
            HookEvent::Chat {
                sender,
                sender_role,
                message,
            } => self.maybe_reply(&sender, sender_role, &message).await,
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Phase 1
    // ------------------------------------------------------------------

    /// AI PF walks the briefing and identifies every unhandled threat. The
    /// decision pipeline runs off the `PfDecisionRequest` hooks this queues.
    async fn identify_all_threats(&self) {
        for threat in &data::registry().phase1.threats {
            let Some(snapshot) = self.snapshot().await else {
                return;
            };
            if snapshot
                .handled_threats
                .iter()
                .any(|(k, _)| k == &threat.keyword)
            {
                continue;
            }
            self.pace_fast().await;
            if !self
                .send(PlayerRequest::IdentifyThreat {
                    keyword: threat.keyword.clone(),
                })
                .await
            {
                return;
            }
        }
        debug!(room = %self.room, "AI PF finished identifying threats");
    }

    async fn decide_threat(&self, keyword: &str) {
        let Some(threat) = data::registry().threat(keyword) else {
            return;
        };
        let Some(snapshot) = self.snapshot().await else {
            return;
        };

        self.pace_slow().await;
        let observation = observer::observe(&snapshot, self.role);
        let outcome = strategy::pf_decision(self.models.slow.as_ref(), &observation, threat).await;
        let action = AgentAction::immediate(PlayerRequest::SubmitDecision {
            keyword: keyword.to_string(),
            option_id: executor::choose_option(&outcome, threat),
        });

        if !self.dispatch(action).await {
            return;
        }

        let explanation = outcome
            .explanation()
            .unwrap_or("Decision submitted, please cross-check.")
            .to_string();
        self.say_after(EXPLANATION_LAG, explanation).await;
    }

    async fn verify_decision(&self, decision: PendingDecision) {
        let Some(snapshot) = self.snapshot().await else {
            return;
        };

        self.pace_slow().await;
        let observation = observer::observe(&snapshot, self.role);
        let outcome =
            strategy::pm_verify(self.models.slow.as_ref(), &observation, &decision).await;
        let approved = executor::approval(&outcome);
        let action = AgentAction::immediate(PlayerRequest::VerifyDecision { approved });

        if !self.dispatch(action).await {
            return;
        }

        let explanation = outcome
            .explanation()
            .unwrap_or(if approved {
                "Cross-checked, I agree with the plan."
            } else {
                "Negative - I want us to rework that plan."
            })
            .to_string();
        self.say_after(EXPLANATION_LAG, explanation).await;
    }

    /// AI PM works through the quiz sequentially with the fast model.
    async fn answer_quiz(&self) {
        for question in &data::registry().phase1.quiz {
            self.pace_fast().await;
            let prompt = executor::quiz_prompt(question);
            let answer = match self.models.fast.chat(&prompt).await {
                Ok(reply) => executor::extract_quiz_answer(&reply, question),
                Err(e) => {
                    debug!(room = %self.room, error = %e, "quiz model failed, using first option");
                    question
                        .options
                        .first()
                        .map(|o| o.id.clone())
                        .unwrap_or_default()
                }
            };
            let action = AgentAction::immediate(PlayerRequest::SubmitQuizAnswer {
                question_id: question.id.clone(),
                answer,
            });
            if !self.dispatch(action).await {
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Phase 2/3
    // ------------------------------------------------------------------

    /// Teaching reply after a human tagged a gauge.
    async fn teach_gauge(&self, gauge_id: &str, value: Option<f64>) {
        let Some(gauge) = data::registry().gauge(gauge_id) else {
            return;
        };
        self.pace_slow().await;
        let explanation = strategy::gauge_teaching(self.models.slow.as_ref(), gauge, value)
            .await
            .unwrap_or_else(|| {
                format!(
                    "{} tagged. Call out anything drifting outside {:.1}-{:.1} {}.",
                    gauge.name, gauge.normal_range.0, gauge.normal_range.1, gauge.unit
                )
            });
        self.say(explanation).await;
    }

    /// Match an alert to a checklist and run the selection, then teach.
    async fn respond_to_alert(&self, alert_message: &str) {
        let Some(snapshot) = self.snapshot().await else {
            return;
        };

        self.pace_fast().await;
        let reply = self
            .models
            .fast
            .chat(&executor::qrh_prompt(alert_message))
            .await
            .ok();
        let Some(key) = executor::match_qrh_key(reply.as_deref(), alert_message) else {
            debug!(room = %self.room, alert = %alert_message, "no checklist matches this alert");
            return;
        };
        if snapshot.used_qrh.iter().any(|k| k == &key) {
            return;
        }

        let action = AgentAction::immediate(PlayerRequest::SelectQrh { key: key.clone() });
        if !self.dispatch(action).await {
            return;
        }

        if let Some(checklist) = data::registry().checklist(&key) {
            if let Some(explanation) =
                strategy::qrh_teaching(self.models.slow.as_ref(), checklist, alert_message).await
            {
                self.say_after(EXPLANATION_LAG, explanation).await;
            }
        }
    }

    /// Work through every item of the checklist on screen, one paced tick at
    /// a time.
    async fn execute_checklist(&self, item_count: usize) {
        for index in 0..item_count {
            let action = AgentAction::paced(PlayerRequest::CheckItem { index });
            if !self.dispatch(action).await {
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    async fn maybe_reply(&self, sender: &str, sender_role: Role, message: &str) {
        let Some(snapshot) = self.snapshot().await else {
            return;
        };
        let observation = observer::observe(&snapshot, self.role);

        self.pace_fast().await;
        let prompt =
            executor::chat_gate_prompt(&observation, self.role, sender, sender_role, message);
        let gate = match self.models.fast.chat(&prompt).await {
            Ok(reply) => executor::parse_chat_gate(&reply),
            Err(e) => {
                debug!(room = %self.room, error = %e, "chat gating failed, staying silent");
                return;
            }
        };
        if gate.should_reply {
            self.say(gate.reply_message).await;
        }
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    /// Fetch a consistent snapshot; `None` means the room is gone and the
    /// current pipeline should be abandoned.
    async fn snapshot(&self) -> Option<StateSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(RoomCommand::Snapshot { reply: reply_tx })
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    /// Execute one action, pacing first unless it is marked immediate.
    /// Returns false when the room has shut down.
    async fn dispatch(&self, action: AgentAction) -> bool {
        if !action.immediate {
            self.pace_fast().await;
        }
        self.send(action.request).await
    }

    /// Issue a game action as this seat's AI actor. Returns false when the
    /// room has shut down.
    async fn send(&self, request: PlayerRequest) -> bool {
        self.commands
            .send(RoomCommand::Request {
                actor: Actor::ai(self.role),
                request,
            })
            .await
            .is_ok()
    }

    async fn say(&self, message: String) {
        if message.trim().is_empty() {
            return;
        }
        let _ = self
            .send(PlayerRequest::SendChat {
                message,
                tts: true,
            })
            .await;
    }

    async fn say_after(&self, delay: Duration, message: String) {
        tokio::time::sleep(delay).await;
        self.say(message).await;
    }

    async fn pace_fast(&self) {
        tokio::time::sleep(AgentPacing::sample(self.models.pacing.fast)).await;
    }

    async fn pace_slow(&self) {
        tokio::time::sleep(AgentPacing::sample(self.models.pacing.slow)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_sample_within_range() {
        for _ in 0..50 {
            let d = AgentPacing::sample((1.0, 3.0));
            assert!(d >= Duration::from_secs_f64(1.0));
            assert!(d < Duration::from_secs_f64(3.0));
        }
    }

    #[test]
    fn test_instant_pacing_is_zero() {
        assert_eq!(AgentPacing::sample(AgentPacing::instant().fast), Duration::ZERO);
    }
}
