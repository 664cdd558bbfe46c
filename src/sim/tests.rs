use super::*;
use crate::gateway::messages::Outbound;
use crate::logger::SessionLogger;
use crate::rooms::hooks::AgentHooks;
use crate::rooms::state::SeatedUser;
use crate::types::{GaugeConfig, Role, SessionId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;
use tokio::sync::broadcast;

struct SimHarness {
    state: RoomState,
    outbound: broadcast::Sender<Outbound>,
    rx: broadcast::Receiver<Outbound>,
    logger: SessionLogger,
    hooks: AgentHooks,
    rng: StdRng,
    _dir: TempDir,
}

impl SimHarness {
    fn new(scenario_key: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let logger = SessionLogger::create(dir.path(), "simroom").unwrap();
        let (outbound, rx) = broadcast::channel(1024);

        let mut state = RoomState::new("simroom");
        state.users.insert(
            SessionId::new_v4(),
            SeatedUser {
                name: "alice".into(),
                role: Role::Pf,
                is_ai: false,
            },
        );
        state.phase = Phase::Phase2;
        state.phase2 = Some(Phase2State::new(
            data::registry().flight(scenario_key).unwrap(),
        ));

        Self {
            state,
            outbound,
            rx,
            logger,
            hooks: AgentHooks::new(),
            rng: StdRng::seed_from_u64(7),
            _dir: dir,
        }
    }

    fn tick_at(&mut self, t: f64) {
        let mut ctx = RoomCtx {
            outbound: &self.outbound,
            logger: &mut self.logger,
            hooks: &self.hooks,
        };
        tick(&mut self.state, &mut ctx, t, &mut self.rng).unwrap();
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg.message);
        }
        out
    }

    fn phase2(&self) -> &Phase2State {
        self.state.phase2.as_ref().unwrap()
    }

    fn gauge(&self, key: &str) -> f64 {
        self.phase2().gauge_states[key]
    }

    fn monitor(&mut self, gauge_id: &str) {
        self.state
            .phase2
            .as_mut()
            .unwrap()
            .monitored_gauges
            .insert(gauge_id.to_string());
    }
}

fn baseline_of(gauge: &GaugeConfig) -> f64 {
    match gauge.baseline {
        crate::types::GaugeBaseline::Single(v) => v,
        crate::types::GaugeBaseline::Split { left, .. } => left,
    }
}

// ============================================================================
// Baseline behavior
// ============================================================================

#[test]
fn test_quiet_tick_keeps_gauges_near_baseline() {
    let mut h = SimHarness::new("routine_flight");
    // t=5: before any event window in routine_flight.
    h.tick_at(5.0);

    for gauge in &data::registry().gauges {
        if gauge.id == "fuel_qty" {
            continue;
        }
        let value = h.gauge(&gauge.id);
        let baseline = baseline_of(gauge);
        assert!(
            (value - baseline).abs() <= baseline.abs() * 0.01 + 1e-9,
            "{} at {} strayed more than 1% from baseline {}",
            gauge.id,
            value,
            baseline
        );
    }
}

#[test]
fn test_every_flight_update_covers_every_gauge_key() {
    let mut h = SimHarness::new("routine_flight");
    h.tick_at(0.1);
    let updates: Vec<ServerMessage> = h
        .drain()
        .into_iter()
        .filter(|m| matches!(m, ServerMessage::FlightUpdate { .. }))
        .collect();
    assert_eq!(updates.len(), 1);
    if let ServerMessage::FlightUpdate { gauges, progress } = &updates[0] {
        for key in [
            "airspeed",
            "altitude",
            "oil_p",
            "rpm",
            "fuel_qty_left",
            "fuel_qty_right",
            "vacuum",
            "ammeter",
        ] {
            assert!(gauges.contains_key(key), "missing {}", key);
        }
        assert!(*progress > 0.0 && *progress < 1.0);
    }
}

#[test]
fn test_fuel_is_monotonically_non_increasing() {
    let mut h = SimHarness::new("routine_flight");
    let mut last_left = f64::MAX;
    let mut last_right = f64::MAX;
    // Through the asymmetric event and past its end.
    let mut t = 0.1;
    while t < 80.0 {
        h.tick_at(t);
        let left = h.gauge("fuel_qty_left");
        let right = h.gauge("fuel_qty_right");
        assert!(left <= last_left + 1e-9, "left fuel rose at t={}", t);
        assert!(right <= last_right + 1e-9, "right fuel rose at t={}", t);
        last_left = left;
        last_right = right;
        t += 1.0;
    }
}

// ============================================================================
// Detection scoring (S4 and boundary 10)
// ============================================================================

#[test]
fn test_monitored_fuel_imbalance_credits_detection_once() {
    let mut h = SimHarness::new("routine_flight");
    h.tick_at(10.0);
    h.monitor("fuel_qty");
    h.drain();

    // t=30: inside the precursor window, imbalance visible on the tanks.
    h.tick_at(30.0);
    assert!(
        h.gauge("fuel_qty_right") < h.gauge("fuel_qty_left") - 1.0,
        "right tank should trail the left by more than a gallon"
    );
    assert_eq!(h.state.score, 20);
    let detection = h.phase2().event_detections["fuel_imbalance"];
    assert_eq!(detection.stage, DetectionStage::Precursor);

    let messages = h.drain();
    assert!(messages.iter().any(|m| matches!(
        m,
        ServerMessage::PrecursorDetected { event_name, score: 20, .. }
            if event_name == "Fuel Imbalance"
    )));

    // t=36: the alert fires but grants no further score.
    h.tick_at(36.0);
    assert_eq!(h.state.score, 20);
    assert_eq!(
        h.phase2().event_detections["fuel_imbalance"].stage,
        DetectionStage::Precursor
    );
    let messages = h.drain();
    assert!(messages.iter().any(|m| matches!(
        m,
        ServerMessage::EventTrigger { msg, .. } if msg == "FUEL IMBALANCE"
    )));
}

#[test]
fn test_detection_just_before_alert_boundary_counts_as_precursor() {
    let mut h = SimHarness::new("routine_flight");
    h.monitor("fuel_qty");
    h.tick_at(34.9);
    assert_eq!(h.state.score, 20);
    assert_eq!(
        h.phase2().event_detections["fuel_imbalance"].stage,
        DetectionStage::Precursor
    );
}

#[test]
fn test_missed_precursor_credits_reaction_at_alert() {
    let mut h = SimHarness::new("routine_flight");
    // Nobody is monitoring; skip straight past the alert boundary.
    h.tick_at(35.1);
    assert_eq!(h.state.score, 10);
    assert_eq!(
        h.phase2().event_detections["fuel_imbalance"].stage,
        DetectionStage::Alert
    );

    // Monitoring afterwards changes nothing: detection is write-once.
    h.monitor("fuel_qty");
    h.tick_at(36.0);
    assert_eq!(h.state.score, 10);
    assert_eq!(
        h.phase2().event_detections["fuel_imbalance"].stage,
        DetectionStage::Alert
    );
}

#[test]
fn test_alert_banner_fires_exactly_once() {
    let mut h = SimHarness::new("routine_flight");
    h.tick_at(35.1);
    h.tick_at(35.2);
    h.tick_at(36.0);
    let banners = h
        .drain()
        .into_iter()
        .filter(|m| matches!(m, ServerMessage::EventTrigger { .. }))
        .count();
    assert_eq!(banners, 1);
}

#[test]
fn test_alert_notifies_agents() {
    let mut h = SimHarness::new("routine_flight");
    let mut rx = h.hooks.register(Role::Pm);
    h.tick_at(35.1);
    let event = rx.try_recv().unwrap();
    assert!(matches!(
        event,
        crate::rooms::hooks::HookEvent::EventAlert { ref message, .. } if message == "FUEL IMBALANCE"
    ));
}

// ============================================================================
// Pattern generators
// ============================================================================

#[test]
fn test_gradual_drop_ramps_oil_pressure_toward_failure() {
    let mut h = SimHarness::new("oil_pressure_loss");
    h.tick_at(21.0);
    let early = h.gauge("oil_p");
    h.tick_at(45.0);
    let late = h.gauge("oil_p");
    assert!(late < early, "oil pressure should decay through the precursor");
    assert!(late > 10.0, "still above the failure value before the alert");

    // Alert window pins the gauge at its failure value.
    h.tick_at(55.0);
    assert!((h.gauge("oil_p") - 10.0).abs() < f64::EPSILON);
}

#[test]
fn test_discharge_drives_ammeter_negative_with_floor() {
    let mut h = SimHarness::new("routine_flight");
    h.tick_at(125.0);
    let value = h.gauge("ammeter");
    assert!(value < -1.0, "ammeter should be well negative, got {}", value);
    assert!(value >= -20.0);

    h.tick_at(135.0);
    assert!((h.gauge("ammeter") - (-12.0)).abs() < f64::EPSILON);
}

#[test]
fn test_stabilized_notice_emitted_once_after_event_end() {
    let mut h = SimHarness::new("routine_flight");
    h.tick_at(35.1);
    h.drain();
    h.tick_at(60.1);
    h.tick_at(61.0);
    let notices = h
        .drain()
        .into_iter()
        .filter(|m| matches!(m, ServerMessage::SysMsg { msg } if msg.contains("stabilized")))
        .count();
    assert_eq!(notices, 1);

    // The gauge returns to baseline jitter after the event.
    let right = h.gauge("oil_p");
    assert!((right - 80.0).abs() <= 80.0 * 0.01 + 1e-9);
}

// ============================================================================
// Mission termination
// ============================================================================

#[test]
fn test_mission_completes_with_debrief_below_threshold() {
    let mut h = SimHarness::new("routine_flight");
    h.tick_at(180.0);
    assert!(h.phase2().finished);
    assert_eq!(h.state.phase, Phase::Ended);
    let messages = h.drain();
    assert!(messages.iter().any(|m| matches!(
        m,
        ServerMessage::MissionComplete { result, .. } if result == "Debrief Required"
    )));
}

#[test]
fn test_mission_passes_above_threshold() {
    let mut h = SimHarness::new("routine_flight");
    h.state.score = 41;
    h.tick_at(180.0);
    let messages = h.drain();
    assert!(messages.iter().any(|m| matches!(
        m,
        ServerMessage::MissionComplete { result, score: 41, .. } if result == "Passed"
    )));
}

#[test]
fn test_ticks_after_completion_are_noops() {
    let mut h = SimHarness::new("routine_flight");
    h.tick_at(180.0);
    h.drain();
    h.tick_at(181.0);
    assert!(h.drain().is_empty());
}
