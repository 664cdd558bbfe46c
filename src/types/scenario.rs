//! Scenario record types: threats, quiz, flight events, gauges, checklists
//!
//! These are the shapes of the read-only registry in `crate::data`. Everything
//! here is plain data; behavior lives in `game` and `sim`.

use serde::{Deserialize, Serialize};

// ============================================================================
// Phase 1: Threats and Quiz
// ============================================================================

/// One response option for a threat or quiz question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

/// Standard-operating-procedure reference shown to the PM during verification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SopGuide {
    pub title: String,
    pub bullets: Vec<String>,
}

/// The 2x2 CRM scoring matrix for a threat decision.
///
/// The penalty for `pf_wrong_pm_approve` deliberately outweighs any single
/// award so that mutual cross-checking dominates solo play.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreMatrix {
    pub pf_correct_pm_approve: i32,
    pub pf_correct_pm_reject: i32,
    pub pf_wrong_pm_approve: i32,
    pub pf_wrong_pm_reject: i32,
}

/// One pre-flight threat embedded in the briefing pack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Threat {
    pub keyword: String,
    pub description: String,
    pub options: Vec<ResponseOption>,
    pub sop: SopGuide,
    pub scores: ScoreMatrix,
}

impl Threat {
    pub fn option(&self, id: &str) -> Option<&ResponseOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

/// Emergency-procedures quiz question answered by the PM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<ResponseOption>,
    pub explanation: String,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> Option<&ResponseOption> {
        self.options.iter().find(|o| o.is_correct)
    }
}

/// One dispatch document (OFP, weather, tech log, NOTAMs) in the briefing pack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BriefingDoc {
    pub source: String,
    pub title: String,
    pub content: String,
}

/// The full pre-flight scenario record for Phase 1
#[derive(Debug, Clone, PartialEq)]
pub struct Phase1Scenario {
    pub key: String,
    pub name: String,
    pub briefing: Vec<BriefingDoc>,
    pub threats: Vec<Threat>,
    pub quiz: Vec<QuizQuestion>,
}

// ============================================================================
// Phase 2: Flight Events and Gauges
// ============================================================================

/// How a gauge misbehaves during an event's precursor window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrecursorPattern {
    /// Fuel: left tank at normal burn, right at triple burn
    Asymmetric,
    /// Linear 15 s ramp toward the failure value with +/-5 noise, floor 30
    FluctuateDown,
    /// Linear ramp toward the failure value, floor baseline - 100
    GradualDrop,
    /// Linearly increasing negative current with small noise, floor -20
    Discharge,
}

/// Cockpit alert severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Caution,
    Warning,
    Failure,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Caution => "caution",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Failure => "failure",
        }
    }
}

/// Sub-alert anomaly a vigilant crew can catch before the alert fires
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Precursor {
    pub gauge: String,
    pub pattern: PrecursorPattern,
    pub description: String,
}

/// The explicit cockpit annunciation for an event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
}

/// One scripted in-flight event.
///
/// Invariant: `0 <= precursor_start < alert_start < event_end <= duration`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightEvent {
    pub id: String,
    pub name: String,
    pub precursor_start_s: f64,
    pub alert_start_s: f64,
    pub event_end_s: f64,
    pub precursor: Precursor,
    pub alert: Alert,
    pub detection_score: i32,
    pub reaction_score: i32,
}

impl FlightEvent {
    pub fn in_precursor_window(&self, t: f64) -> bool {
        t >= self.precursor_start_s && t < self.alert_start_s
    }

    pub fn in_alert_window(&self, t: f64) -> bool {
        t >= self.alert_start_s && t < self.event_end_s
    }
}

/// One in-flight scenario: a timed event queue plus the checklists that
/// count as a correct response.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightScenario {
    pub key: String,
    pub name: String,
    pub duration_s: f64,
    pub events: Vec<FlightEvent>,
    pub acceptable_qrh: Vec<String>,
}

/// Baseline value of a gauge; fuel carries per-tank baselines
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GaugeBaseline {
    Single(f64),
    Split { left: f64, right: f64 },
}

/// Static configuration for one instrument in the gauge bank
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeConfig {
    pub id: String,
    pub name: String,
    pub baseline: GaugeBaseline,
    pub normal_range: (f64, f64),
    pub unit: String,
    /// Value the gauge is held at while an event's alert window is active
    pub failure_value: f64,
    /// Instructor note fed into the AI gauge-teaching prompt
    pub teaching_note: String,
}

// ============================================================================
// Phase 3: QRH
// ============================================================================

/// One emergency checklist in the Quick Reference Handbook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QrhChecklist {
    pub key: String,
    pub title: String,
    pub items: Vec<String>,
    /// What the procedure achieves; fed into the AI QRH-teaching prompt
    pub goal: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_windows() {
        let ev = FlightEvent {
            id: "e".into(),
            name: "E".into(),
            precursor_start_s: 10.0,
            alert_start_s: 20.0,
            event_end_s: 30.0,
            precursor: Precursor {
                gauge: "oil_p".into(),
                pattern: PrecursorPattern::GradualDrop,
                description: String::new(),
            },
            alert: Alert {
                severity: AlertSeverity::Warning,
                message: "OIL".into(),
            },
            detection_score: 20,
            reaction_score: 10,
        };
        assert!(!ev.in_precursor_window(9.9));
        assert!(ev.in_precursor_window(10.0));
        assert!(ev.in_precursor_window(19.9));
        assert!(!ev.in_precursor_window(20.0));
        assert!(ev.in_alert_window(20.0));
        assert!(ev.in_alert_window(29.9));
        assert!(!ev.in_alert_window(30.0));
    }

    #[test]
    fn test_severity_wire_format() {
        assert_eq!(
            serde_json::to_string(&AlertSeverity::Caution).unwrap(),
            "\"caution\""
        );
    }
}
