//! Wire message vocabulary for the realtime gateway
//!
//! Client frames and server broadcasts are flat JSON objects discriminated by
//! a `type` field. The option payloads sent to clients never carry the
//! `is_correct` flags - answers are scored server-side only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::{
    AlertSeverity, BriefingDoc, GameMode, QuizQuestion, ResponseOption, Role, SessionId, SopGuide,
    Threat,
};

// ============================================================================
// Client -> Server
// ============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        room: String,
        username: String,
        role: Role,
        #[serde(default)]
        mode: GameMode,
    },
    PfIdentifyThreat {
        room: String,
        keyword: String,
    },
    PfSubmitDecision {
        room: String,
        keyword: String,
        option_id: String,
    },
    PmVerifyDecision {
        room: String,
        approved: bool,
    },
    StartEmergencyQuiz {
        room: String,
    },
    SubmitQuizAnswer {
        room: String,
        question_id: String,
        answer: String,
    },
    #[serde(rename = "req_phase_2")]
    ReqPhase2 {
        room: String,
    },
    MonitorGauge {
        room: String,
        gauge_id: String,
    },
    SelectChecklist {
        room: String,
        key: String,
    },
    CheckItem {
        room: String,
        index: usize,
    },
    SendChatMessage {
        room: String,
        message: String,
    },
    RequestTts {
        room: String,
        text: String,
        message_id: String,
        sentence_index: u32,
        total_sentences: u32,
    },
}

impl ClientMessage {
    pub fn room(&self) -> &str {
        match self {
            ClientMessage::Join { room, .. }
            | ClientMessage::PfIdentifyThreat { room, .. }
            | ClientMessage::PfSubmitDecision { room, .. }
            | ClientMessage::PmVerifyDecision { room, .. }
            | ClientMessage::StartEmergencyQuiz { room }
            | ClientMessage::SubmitQuizAnswer { room, .. }
            | ClientMessage::ReqPhase2 { room }
            | ClientMessage::MonitorGauge { room, .. }
            | ClientMessage::SelectChecklist { room, .. }
            | ClientMessage::CheckItem { room, .. }
            | ClientMessage::SendChatMessage { room, .. }
            | ClientMessage::RequestTts { room, .. } => room,
        }
    }
}

// ============================================================================
// Server -> Client payload fragments
// ============================================================================

/// A response option with the answer key stripped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionPayload {
    pub id: String,
    pub text: String,
}

impl From<&ResponseOption> for OptionPayload {
    fn from(opt: &ResponseOption) -> Self {
        Self {
            id: opt.id.clone(),
            text: opt.text.clone(),
        }
    }
}

/// A quiz question with the answer key stripped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestionPayload {
    pub id: String,
    pub question: String,
    pub options: Vec<OptionPayload>,
}

impl From<&QuizQuestion> for QuizQuestionPayload {
    fn from(q: &QuizQuestion) -> Self {
        Self {
            id: q.id.clone(),
            question: q.question.clone(),
            options: q.options.iter().map(OptionPayload::from).collect(),
        }
    }
}

/// A threat as presented in the Phase-1 kickoff (keyword + description only;
/// options arrive with the decision modal).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreatPayload {
    pub keyword: String,
    pub description: String,
}

impl From<&Threat> for ThreatPayload {
    fn from(t: &Threat) -> Self {
        Self {
            keyword: t.keyword.clone(),
            description: t.description.clone(),
        }
    }
}

/// Phase-1 kickoff payload: the briefing pack plus the plantable threats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Phase1Payload {
    pub scenario_name: String,
    pub briefing: Vec<BriefingDoc>,
    pub threats: Vec<ThreatPayload>,
}

// ============================================================================
// Server -> Client
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    UserCountUpdate {
        count: usize,
        usernames: Vec<String>,
    },
    RoomFull,
    UserLeft {
        username: String,
        role: Role,
        remaining_count: usize,
    },

    #[serde(rename = "start_phase_1")]
    StartPhase1 {
        data: Phase1Payload,
    },
    ShowPfDecisionModal {
        keyword: String,
        description: String,
        options: Vec<OptionPayload>,
    },
    ShowPmVerifyPanel {
        keyword: String,
        pf_username: String,
        pf_decision: String,
        sop_data: SopGuide,
    },
    WaitingPmVerify {
        keyword: String,
        msg: String,
    },
    ThreatDecisionResult {
        keyword: String,
        result: String,
        msg: String,
        color: String,
        score_change: i32,
    },
    UpdateScore {
        score: i32,
    },
    ShowEmergencyQuiz {
        questions: Vec<QuizQuestionPayload>,
    },
    QuizAnswerResult {
        question_id: String,
        correct: bool,
        explanation: String,
        score_change: i32,
    },

    #[serde(rename = "start_phase_2")]
    StartPhase2 {
        duration: f64,
    },
    FlightUpdate {
        gauges: BTreeMap<String, f64>,
        progress: f64,
    },
    EventTrigger {
        // "type" is taken by the envelope discriminator, so the alert level
        // travels as "severity"
        severity: AlertSeverity,
        msg: String,
        progress: f64,
    },
    PrecursorDetected {
        event_name: String,
        gauge: String,
        score: i32,
        msg: String,
    },
    GaugeMonitored {
        gauge_id: String,
        msg: String,
    },
    MissionComplete {
        score: i32,
        result: String,
        summary: String,
    },

    ShowChecklist {
        title: String,
        items: Vec<String>,
        msg: String,
    },
    ItemChecked {
        index: usize,
        role: Role,
    },
    ChecklistComplete {
        msg: String,
        qrh_key: String,
    },

    ChatMessage {
        username: String,
        role: Role,
        message: String,
        timestamp: String,
        enable_tts: bool,
    },
    TtsAudio {
        message_id: String,
        sentence_index: u32,
        audio_base64: String,
    },

    SysMsg {
        msg: String,
    },
    ErrorMsg {
        msg: String,
    },
}

// ============================================================================
// Broadcast routing
// ============================================================================

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Everyone in the room
    Room,
    /// Exactly one connected session
    Session(SessionId),
}

/// One routed outbound message on a room's broadcast channel.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub target: Target,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn room(message: ServerMessage) -> Self {
        Self {
            target: Target::Room,
            message,
        }
    }

    pub fn session(session: SessionId, message: ServerMessage) -> Self {
        Self {
            target: Target::Session(session),
            message,
        }
    }

    /// Whether a connection with the given session id should receive this.
    pub fn is_for(&self, session: SessionId) -> bool {
        match self.target {
            Target::Room => true,
            Target::Session(id) => id == session,
        }
    }
}

/// Serialize a server message to its wire JSON, for the socket writer.
pub fn encode(message: &ServerMessage) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode server message");
        r#"{"type":"error_msg","msg":"internal encoding error"}"#.to_string()
    })
}

/// Decode one client frame; `None` for frames that are not valid requests.
pub fn decode(raw: &str) -> Option<ClientMessage> {
    match serde_json::from_str::<ClientMessage>(raw) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::debug!(error = %e, raw = %truncate(raw, 120), "undecodable client frame");
            None
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Build the details `Value` for a rejected-action log entry.
pub fn rejection_details(action: &str, error: &str) -> Value {
    serde_json::json!({
        "action": action,
        "error": error,
        "tag": "validation_rejected",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frame_wire_names() {
        let join: ClientMessage = serde_json::from_str(
            r#"{"type":"join","room":"r1","username":"alice","role":"PF","mode":"dual_player"}"#,
        )
        .unwrap();
        assert_eq!(join.room(), "r1");

        let req: ClientMessage =
            serde_json::from_str(r#"{"type":"req_phase_2","room":"r1"}"#).unwrap();
        assert_eq!(req, ClientMessage::ReqPhase2 { room: "r1".into() });

        let tts: ClientMessage = serde_json::from_str(
            r#"{"type":"request_tts","room":"r1","text":"hi","message_id":"m1","sentence_index":0,"total_sentences":2}"#,
        )
        .unwrap();
        assert!(matches!(tts, ClientMessage::RequestTts { sentence_index: 0, .. }));
    }

    #[test]
    fn test_server_message_wire_names() {
        let msg = ServerMessage::StartPhase2 { duration: 180.0 };
        let json: Value = serde_json::from_str(&encode(&msg)).unwrap();
        assert_eq!(json["type"], "start_phase_2");

        let msg = ServerMessage::EventTrigger {
            severity: AlertSeverity::Warning,
            msg: "FUEL IMBALANCE".into(),
            progress: 19.4,
        };
        let json: Value = serde_json::from_str(&encode(&msg)).unwrap();
        assert_eq!(json["type"], "event_trigger");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["msg"], "FUEL IMBALANCE");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not json").is_none());
        assert!(decode(r#"{"type":"no_such_frame","room":"r1"}"#).is_none());
    }

    #[test]
    fn test_target_filtering() {
        let me = SessionId::new_v4();
        let other = SessionId::new_v4();
        let broadcast = Outbound::room(ServerMessage::RoomFull);
        assert!(broadcast.is_for(me));
        let direct = Outbound::session(other, ServerMessage::RoomFull);
        assert!(!direct.is_for(me));
        assert!(direct.is_for(other));
    }
}
