//! Read-only scenario and reference-data registry
//!
//! All static tables - the Phase-1 briefing pack with its threats and quiz,
//! the Phase-2 flight scenario library, the gauge bank, and the QRH - are
//! built once into a process-wide registry. Handlers and agents only ever
//! read from it.

mod flights;
mod phase1;
mod qrh;

use std::sync::OnceLock;

use crate::types::{FlightScenario, GaugeConfig, Phase1Scenario, QrhChecklist, QuizQuestion, Threat};

/// The complete static data set for the trainer.
pub struct Registry {
    pub phase1: Phase1Scenario,
    pub flights: Vec<FlightScenario>,
    pub gauges: Vec<GaugeConfig>,
    pub qrh: Vec<QrhChecklist>,
}

impl Registry {
    pub fn threat(&self, keyword: &str) -> Option<&Threat> {
        self.phase1.threats.iter().find(|t| t.keyword == keyword)
    }

    pub fn quiz_question(&self, id: &str) -> Option<&QuizQuestion> {
        self.phase1.quiz.iter().find(|q| q.id == id)
    }

    pub fn flight(&self, key: &str) -> Option<&FlightScenario> {
        self.flights.iter().find(|s| s.key == key)
    }

    pub fn gauge(&self, id: &str) -> Option<&GaugeConfig> {
        self.gauges.iter().find(|g| g.id == id)
    }

    pub fn checklist(&self, key: &str) -> Option<&QrhChecklist> {
        self.qrh.iter().find(|q| q.key == key)
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry, built on first access.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        phase1: phase1::dispatch_briefing(),
        flights: flights::scenario_library(),
        gauges: flights::gauge_bank(),
        qrh: qrh::qrh_library(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_threat_has_exactly_one_correct_option() {
        for threat in &registry().phase1.threats {
            let correct = threat.options.iter().filter(|o| o.is_correct).count();
            assert_eq!(correct, 1, "threat {} has {} correct options", threat.keyword, correct);
        }
    }

    #[test]
    fn test_every_quiz_question_has_exactly_one_correct_option() {
        for q in &registry().phase1.quiz {
            let correct = q.options.iter().filter(|o| o.is_correct).count();
            assert_eq!(correct, 1, "quiz {} has {} correct options", q.id, correct);
        }
    }

    #[test]
    fn test_event_windows_ordered_and_within_duration() {
        for scenario in &registry().flights {
            for ev in &scenario.events {
                assert!(ev.precursor_start_s >= 0.0, "{}/{}", scenario.key, ev.id);
                assert!(
                    ev.precursor_start_s < ev.alert_start_s,
                    "{}/{}",
                    scenario.key,
                    ev.id
                );
                assert!(ev.alert_start_s < ev.event_end_s, "{}/{}", scenario.key, ev.id);
                assert!(
                    ev.event_end_s <= scenario.duration_s,
                    "{}/{}",
                    scenario.key,
                    ev.id
                );
            }
        }
    }

    #[test]
    fn test_event_gauges_exist() {
        for scenario in &registry().flights {
            for ev in &scenario.events {
                assert!(
                    registry().gauge(&ev.precursor.gauge).is_some(),
                    "unknown gauge {} in {}/{}",
                    ev.precursor.gauge,
                    scenario.key,
                    ev.id
                );
            }
        }
    }

    #[test]
    fn test_acceptable_qrh_keys_exist() {
        for scenario in &registry().flights {
            assert!(!scenario.acceptable_qrh.is_empty(), "{}", scenario.key);
            for key in &scenario.acceptable_qrh {
                assert!(
                    registry().checklist(key).is_some(),
                    "unknown QRH {} in {}",
                    key,
                    scenario.key
                );
            }
        }
    }

    #[test]
    fn test_scenario_named_by_tests_present() {
        assert!(registry().flight("routine_flight").is_some());
        assert!(registry().threat("24015G25KT").is_some());
        assert!(registry().threat("Landing_Light_U/S").is_some());
        assert!(registry().threat("Recovering_from_Cold").is_some());
    }
}
