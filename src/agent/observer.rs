//! Observer stage: pure state extraction, no LLM
//!
//! Projects a room snapshot into the minimal, phase-specific context the
//! strategy prompts consume.

use serde_json::{json, Map, Value};

use crate::rooms::state::StateSnapshot;
use crate::types::{Observation, Phase, Role};

/// Project a snapshot into the phase-specific observation for `role`.
pub fn observe(snapshot: &StateSnapshot, role: Role) -> Observation {
    let context = match snapshot.phase {
        Phase::Waiting | Phase::Phase1 => phase1_context(snapshot),
        Phase::Phase2 => phase2_context(snapshot),
        Phase::Phase3 => phase3_context(snapshot),
        Phase::Ended => {
            let mut map = Map::new();
            map.insert("status".to_string(), json!("ended"));
            map
        }
    };
    Observation {
        phase: snapshot.phase,
        role,
        context,
    }
}

fn phase1_context(snapshot: &StateSnapshot) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "handled_threats".to_string(),
        json!(snapshot
            .handled_threats
            .iter()
            .map(|(keyword, result)| json!({ "keyword": keyword, "result": result.as_str() }))
            .collect::<Vec<_>>()),
    );
    map.insert(
        "pending_decision".to_string(),
        match &snapshot.pending_decision {
            Some(d) => json!({ "keyword": d.keyword, "pf_decision": d.option_text }),
            None => Value::Null,
        },
    );
    map.insert("quiz_answered".to_string(), json!(snapshot.quiz_answered));
    map.insert("chat_history".to_string(), chat_lines(snapshot));
    map
}

fn phase2_context(snapshot: &StateSnapshot) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("gauge_states".to_string(), json!(snapshot.gauge_states));
    map.insert(
        "monitored_gauges".to_string(),
        json!(snapshot.monitored_gauges),
    );
    map.insert(
        "event_detections".to_string(),
        json!(snapshot
            .event_detections
            .iter()
            .map(|(id, d)| json!({ "event": id, "at_s": d.at_s }))
            .collect::<Vec<_>>()),
    );
    map
}

fn phase3_context(snapshot: &StateSnapshot) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("used_qrh".to_string(), json!(snapshot.used_qrh));
    map.insert("current_qrh".to_string(), json!(snapshot.current_qrh));
    map.insert("checked_items".to_string(), json!(snapshot.checked_items));
    map.insert(
        "active_checklist_len".to_string(),
        json!(snapshot.active_checklist_len),
    );
    map
}

/// Bounded chat slice rendered as "sender: message" lines.
fn chat_lines(snapshot: &StateSnapshot) -> Value {
    json!(snapshot
        .chat_tail
        .iter()
        .map(|m| format!("{}: {}", m.sender_name, m.body))
        .collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::state::{DecisionResult, RoomState};
    use crate::types::{Actor, ChatMessage, SessionId};

    #[test]
    fn test_phase1_observation_carries_pending_and_chat() {
        let mut state = RoomState::new("r1");
        state.phase = Phase::Phase1;
        let actor = Actor::human("alice", Role::Pf, SessionId::new_v4());
        state.push_chat(ChatMessage::now(&actor, "checking the METAR", false));

        let snapshot = StateSnapshot::of(&state);
        let obs = observe(&snapshot, Role::Pm);
        assert_eq!(obs.phase, Phase::Phase1);
        assert_eq!(obs.role, Role::Pm);
        assert!(obs.context["pending_decision"].is_null());
        let chat = obs.context["chat_history"].as_array().unwrap();
        assert_eq!(chat.len(), 1);
        assert!(chat[0].as_str().unwrap().starts_with("alice:"));
    }

    #[test]
    fn test_handled_threats_projection() {
        let mut state = RoomState::new("r1");
        state.phase = Phase::Phase1;
        state.phase1.handled_threats.insert(
            "24015G25KT".to_string(),
            crate::rooms::state::HandledThreat {
                pf_choice: "x".into(),
                pf_correct: true,
                pm_approved: true,
                result: DecisionResult::Success,
                score_delta: 15,
            },
        );
        let obs = observe(&StateSnapshot::of(&state), Role::Pf);
        let handled = obs.context["handled_threats"].as_array().unwrap();
        assert_eq!(handled[0]["keyword"], "24015G25KT");
        assert_eq!(handled[0]["result"], "success");
    }
}
