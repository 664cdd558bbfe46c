//! Strategy stage: slow-model deliberation
//!
//! Each task gets a purpose-built prompt demanding a strict JSON reply. The
//! reply is accumulated in full before parsing; anything that fails to parse
//! becomes a `StrategyOutcome::Fallback` and the executor's deterministic
//! defaults take over.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::llm::ChatModel;
use crate::rooms::state::PendingDecision;
use crate::types::{GaugeConfig, Observation, QrhChecklist, Strategy, StrategyOutcome, Threat};

// ============================================================================
// PF decision strategy
// ============================================================================

/// Ask the slow model to choose a response option for a threat.
pub async fn pf_decision(
    model: &dyn ChatModel,
    observation: &Observation,
    threat: &Threat,
) -> StrategyOutcome {
    let option_ids: Vec<&str> = threat.options.iter().map(|o| o.id.as_str()).collect();
    let ids_hint = option_ids.join(" / ");
    let options_text: String = threat
        .options
        .iter()
        .map(|o| format!("{}: {}\n", o.id, o.text))
        .collect();
    let sop_text = format!("{}\n{}", threat.sop.title, threat.sop.bullets.join("\n"));

    let prompt = format!(
        r#"You are an experienced Pilot-Flying facing a pre-flight threat.

### THREAT
Keyword: {keyword}
Description: {description}

### OPTIONS
{options}
### SOP REFERENCE
{sop}

### CREW CHANNEL
{chat}

### TASK
Weigh every option for safety, SOP compliance, and feasibility, then choose.
Prefer active mitigation over options that ignore the threat.
The recommendation MUST be one of exactly these ids: {ids}.

Reply with ONLY this JSON, no prose around it:
{{
  "thinking": "compare the options",
  "assessment": {{"threat_severity": "high|medium|low", "time_pressure": "urgent|moderate|low", "best_option_id": "one of {ids}"}},
  "recommendation": {{"action": "one of {ids}", "confidence": "high|medium|low", "reasoning": "why"}},
  "next_focus": "what to watch after executing",
  "explanation": "one crew-style sentence to your PM, under 30 words"
}}"#,
        keyword = threat.keyword,
        description = threat.description,
        options = options_text,
        sop = sop_text,
        chat = chat_context(observation),
        ids = ids_hint,
    );

    run_strategy(model, &prompt).await
}

// ============================================================================
// PM verification strategy
// ============================================================================

/// Ask the slow model to verify the PF's plan. The framing deliberately asks
/// "is this an active mitigation?" rather than "should we fly?" - naive
/// prompting made PMs reject any plan that cost time or money.
pub async fn pm_verify(
    model: &dyn ChatModel,
    observation: &Observation,
    decision: &PendingDecision,
) -> StrategyOutcome {
    let sop_text = format!("{}\n{}", decision.sop.title, decision.sop.bullets.join("\n"));

    let prompt = format!(
        r#"You are a rigorous Pilot-Monitoring cross-checking your Pilot-Flying.

### SITUATION
Threat identified by PF: {keyword}
PF's proposed plan: {plan}

### SOP REFERENCE
{sop}

### CREW CHANNEL
{chat}

### TASK
Judge the PLAN, not the flight: you are deciding whether the PF's response
actively mitigates the threat, NOT whether the flight should continue. A plan
that accepts delay, cost, or extra workload while managing the threat is a
good plan.
- Approve: the plan engages the threat (uses a standard procedure, runs a
  checklist, consults the right resource) and follows SOP.
- Reject: the plan ignores the threat, does nothing, or violates SOP.

Reply with ONLY this JSON, no prose around it:
{{
  "thinking": "your analysis",
  "assessment": {{"threat_recognized": true, "pf_approach": "active_mitigation|ignores_threat|unclear", "sop_compliance": "compliant|non_compliant|partial"}},
  "recommendation": {{"action": "approve|reject", "confidence": "high|medium|low", "reasoning": "why"}},
  "next_focus": "what to watch next",
  "explanation": "one crew-style sentence to your PF, under 30 words"
}}"#,
        keyword = decision.keyword,
        plan = decision.option_text,
        sop = sop_text,
        chat = chat_context(observation),
    );

    run_strategy(model, &prompt).await
}

// ============================================================================
// Teaching strategies (Phase 2/3)
// ============================================================================

/// Short instructor explanation for a gauge the human just tagged.
pub async fn gauge_teaching(
    model: &dyn ChatModel,
    gauge: &GaugeConfig,
    current_value: Option<f64>,
) -> Option<String> {
    let value_text = match current_value {
        Some(v) => format!("{:.1} {}", v, gauge.unit),
        None => "see the left/right pair on the panel".to_string(),
    };
    let prompt = format!(
        r#"You are a C172 flight instructor. Your student just tagged the "{name}" for monitoring.

### GAUGE
Current value: {value}
Normal range: {lo:.1}-{hi:.1} {unit}
Instructor note: {note}

### TASK
In at most 80 words, tell the student: whether the current value is normal,
what a developing failure looks like on this gauge, and one concrete
monitoring tip. Speak like an instructor, no preamble."#,
        name = gauge.name,
        value = value_text,
        lo = gauge.normal_range.0,
        hi = gauge.normal_range.1,
        unit = gauge.unit,
        note = gauge.teaching_note,
    );

    match model.chat(&prompt).await {
        Ok(reply) if !reply.trim().is_empty() => Some(reply.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, gauge = %gauge.id, "gauge teaching failed");
            None
        }
    }
}

/// Short justification for a selected checklist.
pub async fn qrh_teaching(
    model: &dyn ChatModel,
    checklist: &QrhChecklist,
    alert_message: &str,
) -> Option<String> {
    let prompt = format!(
        r#"You are a C172 flight instructor. The crew selected the "{title}" checklist.

### SITUATION
Active alert: {alert}
Procedure goal: {goal}
Steps: {steps}

### TASK
In at most 60 words, explain why this checklist fits the alert and what its
core goal is. Speak like an instructor, no preamble."#,
        title = checklist.title,
        alert = alert_message,
        goal = checklist.goal,
        steps = checklist.items.join("; "),
    );

    match model.chat(&prompt).await {
        Ok(reply) if !reply.trim().is_empty() => Some(reply.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, checklist = %checklist.key, "QRH teaching failed");
            None
        }
    }
}

// ============================================================================
// Shared plumbing
// ============================================================================

async fn run_strategy(model: &dyn ChatModel, prompt: &str) -> StrategyOutcome {
    let reply = match model.chat(prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(model = model.model_name(), error = %e, "strategy request failed");
            return StrategyOutcome::Fallback {
                reason: format!("model error: {}", e),
            };
        }
    };
    match parse_strategy(&reply) {
        Some(strategy) => StrategyOutcome::Parsed(strategy),
        None => {
            tracing::warn!(
                model = model.model_name(),
                reply_prefix = %reply.chars().take(80).collect::<String>(),
                "strategy reply was not parseable JSON"
            );
            StrategyOutcome::Fallback {
                reason: "malformed strategy JSON".to_string(),
            }
        }
    }
}

fn chat_context(observation: &Observation) -> String {
    let lines: Vec<String> = observation
        .context
        .get("chat_history")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if lines.is_empty() {
        "(no crew communications yet)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Parse a model reply into a `Strategy`, tolerating markdown fences and
/// surrounding prose.
pub fn parse_strategy(reply: &str) -> Option<Strategy> {
    let value = parse_json_reply(reply)?;
    serde_json::from_value(value).ok()
}

/// Salvage the first JSON object from a chatty model reply.
pub fn parse_json_reply(reply: &str) -> Option<Value> {
    let trimmed = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    static JSON_BLOCK: OnceLock<Regex> = OnceLock::new();
    let re = JSON_BLOCK.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?s)\{.*\}").unwrap()
    });
    let captured = re.find(trimmed)?;
    serde_json::from_str::<Value>(captured.as_str())
        .ok()
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_reply_direct() {
        let value = parse_json_reply(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_parse_json_reply_with_fences_and_prose() {
        let reply = "Sure! Here is my analysis:\n```json\n{\"recommendation\": {\"action\": \"approve\"}}\n```\nLet me know.";
        let value = parse_json_reply(reply).unwrap();
        assert_eq!(value["recommendation"]["action"], "approve");
    }

    #[test]
    fn test_parse_json_reply_rejects_garbage() {
        assert!(parse_json_reply("no json here at all").is_none());
        assert!(parse_json_reply("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_parse_strategy_fills_missing_fields() {
        let s = parse_strategy(r#"{"recommendation": {"action": "reject"}}"#).unwrap();
        assert_eq!(s.recommendation.action, "reject");
        assert!(s.explanation.is_empty());
    }
}
