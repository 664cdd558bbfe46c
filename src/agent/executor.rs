//! Executor stage: fast-model answers and deterministic rules
//!
//! Translates strategies and tightly-scoped fast-model replies into concrete
//! game actions. Every path has a conservative default - approve, first
//! option, skip the reply - so a misbehaving model can never stall a session.

use serde_json::Value;

use super::strategy::parse_json_reply;
use crate::data;
use crate::types::{Observation, QuizQuestion, Role, StrategyOutcome, Threat};

// ============================================================================
// Strategy -> action
// ============================================================================

/// Resolve the PF option to submit. An invalid or missing recommendation
/// degrades to the first option.
pub fn choose_option(outcome: &StrategyOutcome, threat: &Threat) -> String {
    let fallback = || {
        threat
            .options
            .first()
            .map(|o| o.id.clone())
            .unwrap_or_default()
    };
    match outcome {
        StrategyOutcome::Parsed(strategy) => {
            let action = strategy.recommendation.action.trim();
            if threat.options.iter().any(|o| o.id == action) {
                action.to_string()
            } else {
                tracing::warn!(
                    keyword = %threat.keyword,
                    action = %action,
                    "recommended option not in the option set, degrading to first"
                );
                fallback()
            }
        }
        StrategyOutcome::Fallback { .. } => fallback(),
    }
}

/// Resolve the PM verdict. The conservative default is to approve.
pub fn approval(outcome: &StrategyOutcome) -> bool {
    match outcome {
        StrategyOutcome::Parsed(strategy) => {
            !strategy.recommendation.action.trim().eq_ignore_ascii_case("reject")
        }
        StrategyOutcome::Fallback { .. } => true,
    }
}

// ============================================================================
// Quiz answering (fast model)
// ============================================================================

pub fn quiz_prompt(question: &QuizQuestion) -> String {
    let options_text: String = question
        .options
        .iter()
        .map(|o| format!("{}: {}\n", o.id, o.text))
        .collect();
    format!(
        "Question: {}\n\nOptions:\n{}\nUsing C172 emergency-procedure knowledge, \
         answer with the option id only (one letter).",
        question.question, options_text
    )
}

/// Pull the chosen option id out of a fast-model reply. Ids are single
/// letters, so matching is token-based rather than substring-based; the
/// default is the first option.
pub fn extract_quiz_answer(reply: &str, question: &QuizQuestion) -> String {
    let fallback = || {
        question
            .options
            .first()
            .map(|o| o.id.clone())
            .unwrap_or_default()
    };
    for token in reply
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_ascii_lowercase();
        if question.options.iter().any(|o| o.id == token) {
            return token;
        }
    }
    fallback()
}

// ============================================================================
// QRH matching (fast model with deterministic fallback)
// ============================================================================

pub fn qrh_prompt(alert_message: &str) -> String {
    let keys: Vec<&str> = data::registry().qrh.iter().map(|c| c.key.as_str()).collect();
    format!(
        "Cockpit alert: \"{}\"\n\nWhich emergency checklist applies? \
         Answer with exactly one key from: {}.",
        alert_message,
        keys.join(", ")
    )
}

/// Alert-text keywords to checklist keys, for when the model reply is
/// unusable.
const ALERT_QRH_MAP: &[(&str, &str)] = &[
    ("OIL PRESSURE", "low_oil_pressure"),
    ("CARBURETOR", "carburetor_icing"),
    ("FUEL IMBALANCE", "fuel_imbalance"),
    ("VACUUM", "vacuum_failure"),
    ("ALTERNATOR", "alternator_failure"),
    ("ENGINE FIRE", "engine_fire"),
    ("ELECTRICAL FIRE", "electrical_fire"),
];

/// Resolve the checklist for an alert: model reply first, keyword map second.
pub fn match_qrh_key(reply: Option<&str>, alert_message: &str) -> Option<String> {
    if let Some(reply) = reply {
        let reply_lower = reply.to_lowercase();
        for checklist in &data::registry().qrh {
            if reply_lower.contains(&checklist.key)
                || reply.to_uppercase().contains(&checklist.title)
            {
                return Some(checklist.key.clone());
            }
        }
    }

    let alert_upper = alert_message.to_uppercase();
    ALERT_QRH_MAP
        .iter()
        .find(|(needle, _)| alert_upper.contains(needle))
        .map(|(_, key)| key.to_string())
}

// ============================================================================
// Chat gating (fast model)
// ============================================================================

/// Parsed verdict on whether to answer a crew chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatGate {
    pub should_reply: bool,
    pub reply_message: String,
}

pub fn chat_gate_prompt(
    observation: &Observation,
    role: Role,
    sender: &str,
    sender_role: Role,
    message: &str,
) -> String {
    let history = observation
        .context
        .get("chat_history")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(first message of the session)".to_string());

    format!(
        r#"You are the {role} in a two-pilot training flight, currently in {phase}.

### RECENT CREW CHANNEL
{history}

### YOUR PARTNER JUST SAID
{sender} ({sender_role}): {message}

### TASK
Decide quickly whether this needs a reply.
Reply when: they ask you something, want your judgement, discuss a decision,
share an important observation, or voice a concern.
Stay silent when: they are thinking aloud, stating facts that need no
response, or just acknowledging ("roger", "copy").

Reply with ONLY this JSON:
{{"should_reply": true, "reply_message": "one short natural sentence, or empty", "reasoning": "brief"}}"#,
        role = role,
        phase = observation.phase,
        history = history,
        sender = sender,
        sender_role = sender_role,
        message = message,
    )
}

/// Parse the gate verdict; anything unparseable means stay silent.
pub fn parse_chat_gate(reply: &str) -> ChatGate {
    let silent = ChatGate {
        should_reply: false,
        reply_message: String::new(),
    };
    let Some(value) = parse_json_reply(reply) else {
        return silent;
    };
    let should_reply = value
        .get("should_reply")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let reply_message = value
        .get("reply_message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    if should_reply && !reply_message.is_empty() {
        ChatGate {
            should_reply: true,
            reply_message,
        }
    } else {
        silent
    }
}
