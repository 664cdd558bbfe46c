//! Session log replay
//!
//! Reconstructs the final score and the threat-outcome map from an
//! append-only session log, without any live room state. Used for debriefs
//! and as the replayability check on the logging pipeline.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use super::LogRecord;

/// Outcome of replaying one session log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub room: String,
    /// Sum of every `score_change` recorded in the log
    pub final_score: i32,
    /// keyword -> result tag, from the PM verification records
    pub handled_threats: HashMap<String, String>,
    pub records: usize,
}

/// Replay a session log file into a summary.
pub fn replay_session(path: &Path) -> Result<ReplaySummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading session log {}", path.display()))?;

    let mut summary = ReplaySummary::default();

    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("parsing log line {}", idx + 1))?;

        // Opening record carries the room name and no action.
        if value.get("event").and_then(Value::as_str) == Some("session_created") {
            if let Some(room) = value.get("room").and_then(Value::as_str) {
                summary.room = room.to_string();
            }
            continue;
        }

        let record: LogRecord = serde_json::from_value(value)
            .with_context(|| format!("decoding log record on line {}", idx + 1))?;
        summary.records += 1;

        if let Some(delta) = record.details.get("score_change").and_then(Value::as_i64) {
            summary.final_score += delta as i32;
        }

        if record.action == "pm_verify_decision" {
            let keyword = record
                .details
                .get("keyword")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let result = record
                .details
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if !keyword.is_empty() {
                summary.handled_threats.insert(keyword, result);
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::SessionLogger;
    use serde_json::json;

    #[test]
    fn test_replay_reconstructs_score_and_threats() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::create(dir.path(), "r1").unwrap();

        logger
            .log(
                "bob",
                "PM",
                "pm_verify_decision",
                json!({"keyword": "24015G25KT", "result": "success", "score_change": 15}),
                "phase1",
                15,
            )
            .unwrap();
        logger
            .log(
                "bob",
                "PM",
                "quiz_answer_submitted",
                json!({"question_id": "q1", "correct": false, "score_change": -5}),
                "phase1",
                10,
            )
            .unwrap();
        logger
            .log(
                "bob",
                "PM",
                "pm_verify_decision",
                json!({"keyword": "Landing_Light_U/S", "result": "pm_catch", "score_change": 5}),
                "phase1",
                15,
            )
            .unwrap();

        let summary = replay_session(logger.path()).unwrap();
        assert_eq!(summary.room, "r1");
        assert_eq!(summary.final_score, 15);
        assert_eq!(summary.records, 3);
        assert_eq!(
            summary.handled_threats.get("24015G25KT").map(String::as_str),
            Some("success")
        );
        assert_eq!(
            summary.handled_threats.get("Landing_Light_U/S").map(String::as_str),
            Some("pm_catch")
        );
    }
}
