//! Game logic - the single serialization boundary for room mutation
//!
//! Every operation here validates its inputs, mutates `RoomState`, appends a
//! session-log record, and broadcasts result messages. Humans and AIs are
//! indistinguishable at this layer: both arrive as an [`Actor`], and the only
//! behavioral difference is that prompts for an AI seat are delivered as
//! agent hooks instead of client messages.

mod error;

pub use error::GameError;

use serde_json::json;
use tokio::sync::broadcast;

use crate::data;
use crate::gateway::messages::{
    Outbound, Phase1Payload, QuizQuestionPayload, ServerMessage, ThreatPayload,
};
use crate::logger::SessionLogger;
use crate::rooms::hooks::{AgentHooks, HookEvent};
use crate::rooms::state::{
    DecisionResult, HandledThreat, PendingDecision, Phase2State, QuizResult, RoomState,
};
use crate::types::{Actor, Phase, PlayerRequest, Role, SessionId};

/// Score awarded or deducted for a checklist choice.
pub const QRH_SCORE: i32 = 20;

/// Quiz scoring: correct / incorrect.
pub const QUIZ_CORRECT_SCORE: i32 = 10;
pub const QUIZ_WRONG_SCORE: i32 = -5;

// ============================================================================
// Operation context
// ============================================================================

/// Everything an operation needs besides the state itself: the room's
/// broadcast channel, its session log, and the AI hook registry. Owned by the
/// room actor and lent per dispatch.
pub struct RoomCtx<'a> {
    pub outbound: &'a broadcast::Sender<Outbound>,
    pub logger: &'a mut SessionLogger,
    pub hooks: &'a AgentHooks,
}

impl RoomCtx<'_> {
    pub fn emit_room(&self, message: ServerMessage) {
        // No receivers just means nobody is connected right now.
        let _ = self.outbound.send(Outbound::room(message));
    }

    pub fn emit_session(&self, session: SessionId, message: ServerMessage) {
        let _ = self.outbound.send(Outbound::session(session, message));
    }

    fn log(
        &mut self,
        state: &RoomState,
        username: &str,
        role: &str,
        action: &str,
        details: serde_json::Value,
    ) -> Result<(), GameError> {
        self.logger
            .log(username, role, action, details, state.phase.as_str(), state.score)
            .map_err(|e| GameError::LogWrite(e.to_string()))
    }

    fn log_actor(
        &mut self,
        state: &RoomState,
        actor: &Actor,
        action: &str,
        details: serde_json::Value,
    ) -> Result<(), GameError> {
        self.log(state, &actor.name, actor.role.as_str(), action, details)
    }

    /// System-attributed log record; used by the simulation loop and the
    /// room lifecycle paths.
    pub(crate) fn log_system(
        &mut self,
        state: &RoomState,
        action: &str,
        details: serde_json::Value,
    ) -> Result<(), GameError> {
        self.log(state, "SYSTEM", "SYSTEM", action, details)
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Route one player request to its operation. The caller reports any error
/// back to the requester as `error_msg` and logs the rejection.
pub fn dispatch(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    request: &PlayerRequest,
) -> Result<(), GameError> {
    match request {
        PlayerRequest::IdentifyThreat { keyword } => identify_threat(state, ctx, actor, keyword),
        PlayerRequest::SubmitDecision { keyword, option_id } => {
            submit_decision(state, ctx, actor, keyword, option_id)
        }
        PlayerRequest::VerifyDecision { approved } => {
            verify_decision(state, ctx, actor, *approved)
        }
        PlayerRequest::StartQuiz => start_quiz(state, ctx, actor),
        PlayerRequest::SubmitQuizAnswer { question_id, answer } => {
            submit_quiz_answer(state, ctx, actor, question_id, answer)
        }
        PlayerRequest::RequestPhase2 => request_phase2(state, ctx, actor),
        PlayerRequest::MonitorGauge { gauge_id } => {
            monitor_gauge(state, ctx, actor, gauge_id).map(|_| ())
        }
        PlayerRequest::SelectQrh { key } => select_qrh(state, ctx, actor, key),
        PlayerRequest::CheckItem { index } => check_item(state, ctx, actor, *index),
        PlayerRequest::SendChat { message, tts } => send_chat(state, ctx, actor, message, *tts),
    }
}

// ============================================================================
// Phase transitions
// ============================================================================

/// Kick off Phase 1 once the room reaches its seating threshold.
pub fn start_phase1(state: &mut RoomState, ctx: &mut RoomCtx) -> Result<(), GameError> {
    let scenario = &data::registry().phase1;
    state.phase = Phase::Phase1;

    ctx.log(
        state,
        "SYSTEM",
        "SYSTEM",
        "phase1_start",
        json!({ "scenario": scenario.key }),
    )?;

    ctx.emit_room(ServerMessage::StartPhase1 {
        data: Phase1Payload {
            scenario_name: scenario.name.clone(),
            briefing: scenario.briefing.clone(),
            threats: scenario.threats.iter().map(ThreatPayload::from).collect(),
        },
    });

    ctx.hooks.notify_all(HookEvent::Phase1Start);
    Ok(())
}

// ============================================================================
// Phase 1: threat identification and the decision queue
// ============================================================================

/// PF marks a briefing keyword as an active threat under decision.
pub fn identify_threat(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    keyword: &str,
) -> Result<(), GameError> {
    if actor.role != Role::Pf {
        return Err(GameError::WrongRole(Role::Pf));
    }
    let threat = data::registry()
        .threat(keyword)
        .ok_or_else(|| GameError::UnknownThreat(keyword.to_string()))?;
    if state.phase1.handled_threats.contains_key(keyword) {
        return Err(GameError::ThreatAlreadyResolved(keyword.to_string()));
    }

    state.phase1.identified.insert(keyword.to_string());

    ctx.log_actor(
        state,
        actor,
        "pf_identify_threat",
        json!({ "keyword": keyword }),
    )?;

    if actor.is_ai {
        ctx.hooks.notify(
            Role::Pf,
            HookEvent::PfDecisionRequest {
                keyword: keyword.to_string(),
            },
        );
    } else if let Some(session) = actor.session {
        ctx.emit_session(
            session,
            ServerMessage::ShowPfDecisionModal {
                keyword: threat.keyword.clone(),
                description: threat.description.clone(),
                options: threat.options.iter().map(Into::into).collect(),
            },
        );
    }

    Ok(())
}

/// PF submits a response option for a threat. Decisions queue up and are
/// promoted to the PM strictly in submission order.
pub fn submit_decision(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    keyword: &str,
    option_id: &str,
) -> Result<(), GameError> {
    if actor.role != Role::Pf {
        return Err(GameError::WrongRole(Role::Pf));
    }
    let threat = data::registry()
        .threat(keyword)
        .ok_or_else(|| GameError::UnknownThreat(keyword.to_string()))?;
    let option = threat.option(option_id).ok_or_else(|| GameError::UnknownOption {
        keyword: keyword.to_string(),
        option: option_id.to_string(),
    })?;

    let decision = PendingDecision {
        keyword: keyword.to_string(),
        option_id: option_id.to_string(),
        option_text: option.text.clone(),
        is_correct: option.is_correct,
        pf_name: actor.name.clone(),
        sop: threat.sop.clone(),
    };

    ctx.log_actor(
        state,
        actor,
        "pf_submit_decision",
        json!({
            "keyword": keyword,
            "option_id": option_id,
            "option_text": option.text,
            "is_correct": option.is_correct,
            "queued": true,
        }),
    )?;

    state.phase1.decision_queue.push_back(decision);
    let queue_position = state.phase1.decision_queue.len();

    promote_next_decision(state, ctx);

    if !actor.is_ai {
        if let Some(session) = actor.session {
            ctx.emit_session(
                session,
                ServerMessage::WaitingPmVerify {
                    keyword: keyword.to_string(),
                    msg: format!(
                        "Waiting for PM verification... (queue position {})",
                        queue_position
                    ),
                },
            );
        }
    }

    Ok(())
}

/// Promote the queue head to `pending_decision` and emit the verify prompt -
/// exactly once per decision. Runs inside the same dispatch as the verify
/// that freed the slot, so promotion is atomic with respect to any further
/// client message.
fn promote_next_decision(state: &mut RoomState, ctx: &mut RoomCtx) {
    if state.phase1.pending_decision.is_some() {
        return;
    }
    let Some(decision) = state.phase1.decision_queue.pop_front() else {
        return;
    };
    state.phase1.pending_decision = Some(decision.clone());

    match state.seat(Role::Pm) {
        Some((_, user)) if user.is_ai => {
            ctx.hooks
                .notify(Role::Pm, HookEvent::PmVerifyRequest { decision });
        }
        Some((session, _)) => {
            ctx.emit_session(
                *session,
                ServerMessage::ShowPmVerifyPanel {
                    keyword: decision.keyword.clone(),
                    pf_username: decision.pf_name.clone(),
                    pf_decision: decision.option_text.clone(),
                    sop_data: decision.sop.clone(),
                },
            );
        }
        None => {
            tracing::warn!(room = %state.id, "decision promoted with no PM seated");
        }
    }
}

/// PM verifies the pending decision; the 2x2 CRM matrix scores the pair.
pub fn verify_decision(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    approved: bool,
) -> Result<(), GameError> {
    if actor.role != Role::Pm {
        return Err(GameError::WrongRole(Role::Pm));
    }
    let pending = state
        .phase1
        .pending_decision
        .clone()
        .ok_or(GameError::NoPendingDecision)?;

    let threat = data::registry()
        .threat(&pending.keyword)
        .ok_or_else(|| GameError::UnknownThreat(pending.keyword.clone()))?;
    let scores = threat.scores;

    let (score_change, result, msg) = match (pending.is_correct, approved) {
        (true, true) => (
            scores.pf_correct_pm_approve,
            DecisionResult::Success,
            format!("Crew cross-check complete: threat '{}' handled correctly.", pending.keyword),
        ),
        (true, false) => (
            scores.pf_correct_pm_reject,
            DecisionResult::PmError,
            "PM rejected a sound plan - reassess before continuing.".to_string(),
        ),
        (false, true) => (
            scores.pf_wrong_pm_approve,
            DecisionResult::CriticalError,
            "Critical: flawed plan approved by both pilots - double failure.".to_string(),
        ),
        (false, false) => (
            scores.pf_wrong_pm_reject,
            DecisionResult::PmCatch,
            "PM caught a flawed plan - threat management is working.".to_string(),
        ),
    };

    state.score += score_change;
    state.phase1.handled_threats.insert(
        pending.keyword.clone(),
        HandledThreat {
            pf_choice: pending.option_text.clone(),
            pf_correct: pending.is_correct,
            pm_approved: approved,
            result,
            score_delta: score_change,
        },
    );
    state.phase1.pending_decision = None;

    ctx.log_actor(
        state,
        actor,
        "pm_verify_decision",
        json!({
            "keyword": pending.keyword,
            "approved": approved,
            "pf_decision": pending.option_text,
            "pf_correct": pending.is_correct,
            "result": result.as_str(),
            "score_change": score_change,
        }),
    )?;

    ctx.emit_room(ServerMessage::ThreatDecisionResult {
        keyword: pending.keyword.clone(),
        result: result.as_str().to_string(),
        msg,
        color: result.color().to_string(),
        score_change,
    });
    ctx.emit_room(ServerMessage::UpdateScore { score: state.score });

    // The freed slot pulls the next queued decision in the same dispatch.
    promote_next_decision(state, ctx);

    Ok(())
}

// ============================================================================
// Phase 1: emergency quiz
// ============================================================================

/// A client signalled readiness for the emergency quiz.
pub fn start_quiz(state: &mut RoomState, ctx: &mut RoomCtx, actor: &Actor) -> Result<(), GameError> {
    let quiz = &data::registry().phase1.quiz;

    ctx.log_actor(
        state,
        actor,
        "start_emergency_quiz",
        json!({ "question_count": quiz.len() }),
    )?;

    ctx.emit_room(ServerMessage::ShowEmergencyQuiz {
        questions: quiz.iter().map(QuizQuestionPayload::from).collect(),
    });

    if state.seat(Role::Pm).is_some_and(|(_, u)| u.is_ai) {
        ctx.hooks.notify(Role::Pm, HookEvent::QuizDelivered);
    }
    Ok(())
}

/// PM answers one quiz question: +10 correct, -5 incorrect.
pub fn submit_quiz_answer(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    question_id: &str,
    answer: &str,
) -> Result<(), GameError> {
    if actor.role != Role::Pm {
        return Err(GameError::WrongRole(Role::Pm));
    }
    let question = data::registry()
        .quiz_question(question_id)
        .ok_or_else(|| GameError::UnknownQuestion(question_id.to_string()))?;

    let correct = question
        .correct_option()
        .is_some_and(|opt| opt.id == answer);
    let score_change = if correct { QUIZ_CORRECT_SCORE } else { QUIZ_WRONG_SCORE };

    state.score += score_change;
    state.phase1.quiz_results.push(QuizResult {
        question_id: question_id.to_string(),
        chosen: answer.to_string(),
        correct,
        score_delta: score_change,
    });

    ctx.log_actor(
        state,
        actor,
        "quiz_answer_submitted",
        json!({
            "question_id": question_id,
            "question": question.question,
            "answer": answer,
            "correct": correct,
            "score_change": score_change,
        }),
    )?;

    ctx.emit_room(ServerMessage::QuizAnswerResult {
        question_id: question_id.to_string(),
        correct,
        explanation: question.explanation.clone(),
        score_change,
    });
    ctx.emit_room(ServerMessage::UpdateScore { score: state.score });

    Ok(())
}

// ============================================================================
// Phase 2 entry and gauge monitoring
// ============================================================================

/// A user confirms readiness for the flight phase; when every seated human
/// has confirmed, the simulation starts.
pub fn request_phase2(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
) -> Result<(), GameError> {
    if let Some(session) = actor.session {
        state.ready_for_next.insert(session);
    }

    ctx.log_actor(
        state,
        actor,
        "req_phase_2",
        json!({ "ready_count": state.ready_for_next.len() }),
    )?;

    let threshold = state.human_count().max(1);
    if state.ready_for_next.len() < threshold || state.phase2.is_some() {
        return Ok(());
    }

    let flights = &data::registry().flights;
    let pick = rand::Rng::gen_range(&mut rand::thread_rng(), 0..flights.len());
    let scenario = &flights[pick];

    state.phase = Phase::Phase2;
    state.phase2 = Some(Phase2State::new(scenario));

    ctx.log(
        state,
        "SYSTEM",
        "SYSTEM",
        "phase2_start",
        json!({ "scenario": scenario.key, "duration_s": scenario.duration_s }),
    )?;

    ctx.emit_room(ServerMessage::StartPhase2 {
        duration: scenario.duration_s,
    });

    Ok(())
}

/// Gauge metadata returned from `monitor_gauge` for teaching use.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeInfo {
    pub gauge_id: String,
    pub name: String,
    pub current_value: Option<f64>,
    pub unit: String,
    pub normal_range: (f64, f64),
    pub teaching_note: String,
}

/// Tag a gauge for monitoring. Idempotent: tagging twice equals tagging once.
pub fn monitor_gauge(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    gauge_id: &str,
) -> Result<GaugeInfo, GameError> {
    let gauge = data::registry()
        .gauge(gauge_id)
        .ok_or_else(|| GameError::UnknownGauge(gauge_id.to_string()))?;
    let phase2 = state.phase2.as_mut().ok_or(GameError::NoActiveFlight)?;

    phase2.monitored_gauges.insert(gauge_id.to_string());
    let current_value = phase2.gauge_states.get(gauge_id).copied();

    let info = GaugeInfo {
        gauge_id: gauge_id.to_string(),
        name: gauge.name.clone(),
        current_value,
        unit: gauge.unit.clone(),
        normal_range: gauge.normal_range,
        teaching_note: gauge.teaching_note.clone(),
    };

    ctx.log_actor(
        state,
        actor,
        "monitor_gauge",
        json!({
            "gauge_id": gauge_id,
            "gauge_name": info.name,
            "current_value": info.current_value,
        }),
    )?;

    ctx.emit_room(ServerMessage::GaugeMonitored {
        gauge_id: gauge_id.to_string(),
        msg: format!("Monitoring tagged: {}", info.name),
    });

    if !actor.is_ai {
        ctx.hooks.notify_all(HookEvent::GaugeMonitoredByHuman {
            gauge_id: gauge_id.to_string(),
            value: current_value,
        });
    }

    Ok(info)
}

// ============================================================================
// Phase 3: QRH execution
// ============================================================================

/// Select an emergency checklist. Correctness is judged against the active
/// scenario's acceptable set and scored at +/-20 - the single largest award
/// in the exercise, because picking the right procedure matters most.
pub fn select_qrh(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    key: &str,
) -> Result<(), GameError> {
    let checklist = data::registry()
        .checklist(key)
        .ok_or_else(|| GameError::UnknownChecklist(key.to_string()))?;

    if state.phase3.used_qrh.contains(key) {
        return Err(GameError::ChecklistAlreadyUsed(key.to_string()));
    }

    let scenario = state
        .phase2
        .as_ref()
        .map(|p| p.scenario)
        .ok_or(GameError::NoActiveFlight)?;

    state.phase = Phase::Phase3;
    state.phase3.used_qrh.insert(key.to_string());
    state.phase3.current_qrh = Some(key.to_string());
    state.phase3.checked_items.clear();
    state.phase3.active_checklist_len = checklist.items.len();

    let is_correct = scenario.acceptable_qrh.iter().any(|k| k == key);
    let score_change = if is_correct { QRH_SCORE } else { -QRH_SCORE };
    state.score += score_change;

    let msg = if is_correct {
        format!("Correct: {} is an appropriate response.", checklist.title)
    } else {
        let expected: Vec<String> = scenario
            .acceptable_qrh
            .iter()
            .filter_map(|k| data::registry().checklist(k))
            .map(|c| c.title.clone())
            .collect();
        format!(
            "Incorrect: the active condition is {}; expected {}.",
            scenario.name,
            expected.join(" or ")
        )
    };

    ctx.log_actor(
        state,
        actor,
        "select_qrh",
        json!({
            "selected_qrh": key,
            "qrh_title": checklist.title,
            "acceptable_qrh": scenario.acceptable_qrh,
            "is_correct": is_correct,
            "score_change": score_change,
        }),
    )?;

    ctx.emit_room(ServerMessage::ShowChecklist {
        title: checklist.title.clone(),
        items: checklist.items.clone(),
        msg,
    });
    ctx.emit_room(ServerMessage::UpdateScore { score: state.score });

    ctx.hooks.notify_all(HookEvent::ChecklistShown {
        key: key.to_string(),
        title: checklist.title.clone(),
        item_count: checklist.items.len(),
    });

    Ok(())
}

/// Mark one checklist item complete. Completing the last item closes the
/// checklist but does not end the session - the flight continues.
pub fn check_item(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    index: usize,
) -> Result<(), GameError> {
    if index >= state.phase3.active_checklist_len {
        return Err(GameError::ItemOutOfRange(index));
    }

    state.phase3.checked_items.insert(index);

    ctx.log_actor(
        state,
        actor,
        "check_item",
        json!({
            "item_index": index,
            "checked_count": state.phase3.checked_items.len(),
            "total_items": state.phase3.active_checklist_len,
        }),
    )?;

    ctx.emit_room(ServerMessage::ItemChecked {
        index,
        role: actor.role,
    });

    if state.phase3.checked_items.len() == state.phase3.active_checklist_len {
        let qrh_key = state.phase3.current_qrh.clone().unwrap_or_default();
        ctx.log(
            state,
            "SYSTEM",
            "SYSTEM",
            "checklist_complete",
            json!({
                "checked_count": state.phase3.checked_items.len(),
                "total_items": state.phase3.active_checklist_len,
                "qrh_key": qrh_key,
            }),
        )?;
        ctx.emit_room(ServerMessage::ChecklistComplete {
            msg: "Checklist complete. Continue monitoring the flight.".to_string(),
            qrh_key,
        });
    }

    Ok(())
}

// ============================================================================
// Chat
// ============================================================================

/// Append a chat message to the room, broadcasting it and hooking the peer
/// AI when a human speaks.
pub fn send_chat(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    actor: &Actor,
    message: &str,
    tts_requested: bool,
) -> Result<(), GameError> {
    let record = crate::types::ChatMessage::now(actor, message, tts_requested);
    state.push_chat(record.clone());

    let action = if actor.is_ai { "ai_chat_message" } else { "chat_message" };
    ctx.log_actor(
        state,
        actor,
        action,
        json!({ "message": message, "enable_tts": tts_requested }),
    )?;

    ctx.emit_room(ServerMessage::ChatMessage {
        username: record.sender_name.clone(),
        role: record.sender_role,
        message: record.body.clone(),
        timestamp: record.timestamp_iso.clone(),
        enable_tts: record.tts_requested,
    });

    if !actor.is_ai {
        ctx.hooks.notify(
            actor.role.peer(),
            HookEvent::Chat {
                sender: record.sender_name,
                sender_role: record.sender_role,
                message: record.body,
            },
        );
    }

    Ok(())
}
