//! Per-room flight simulation tick
//!
//! Runs at 10 Hz inside the room actor's select loop, so every tick executes
//! in the same single-dispatch context as client commands. Each tick refreshes
//! the gauge bank, drives the active events' precursor patterns, credits
//! detection/reaction scores, and publishes a `flight_update`.
//!
//! The tick is a pure function of `(state, t, rng)` so the regression tests
//! drive it with a seeded RNG and a synthetic clock.

use rand::Rng;
use serde_json::json;
use std::collections::BTreeMap;

use crate::data;
use crate::game::{GameError, RoomCtx};
use crate::gateway::messages::ServerMessage;
use crate::rooms::hooks::HookEvent;
use crate::rooms::state::{Detection, DetectionStage, Phase2State, RoomState};
use crate::types::{FlightEvent, GaugeBaseline, Phase, PrecursorPattern};

/// Simulation tick period.
pub const TICK_INTERVAL_MS: u64 = 100;

/// Mission passes when the final score strictly exceeds this. Not calibrated
/// against any study; tune freely.
pub const PASS_SCORE: i32 = 40;

/// Normal fuel burn, gallons per second per tank.
pub const FUEL_BURN_GAL_PER_S: f64 = 0.05;

/// Right-tank burn multiplier during an asymmetric-fuel event.
const ASYMMETRIC_MULTIPLIER: f64 = 3.0;

/// Baseline jitter applied every tick: value = baseline * (1 +/- 1%).
const BASELINE_JITTER: f64 = 0.01;

const FLUCTUATE_RAMP_S: f64 = 15.0;
const FLUCTUATE_NOISE: f64 = 5.0;
const FLUCTUATE_FLOOR: f64 = 30.0;
const GRADUAL_DROP_MAX_DELTA: f64 = 100.0;
const DISCHARGE_FLOOR: f64 = -20.0;
const DISCHARGE_NOISE: f64 = 0.5;

/// Advance the simulation to elapsed time `t` seconds.
///
/// No-op once the mission has completed or if Phase 2 never started.
pub fn tick(
    state: &mut RoomState,
    ctx: &mut RoomCtx,
    t: f64,
    rng: &mut impl Rng,
) -> Result<(), GameError> {
    let Some(mut phase2) = state.phase2.take() else {
        return Ok(());
    };
    if phase2.finished {
        state.phase2 = Some(phase2);
        return Ok(());
    }
    let result = tick_inner(state, &mut phase2, ctx, t, rng);
    state.phase2 = Some(phase2);
    result
}

fn tick_inner(
    state: &mut RoomState,
    phase2: &mut Phase2State,
    ctx: &mut RoomCtx,
    t: f64,
    rng: &mut impl Rng,
) -> Result<(), GameError> {
    let scenario = phase2.scenario;
    let progress = (100.0 * t / scenario.duration_s).min(100.0);

    refresh_baselines(phase2, t, rng);

    for event in &scenario.events {
        if event.in_precursor_window(t) {
            apply_precursor_pattern(phase2, event, t, rng);

            let monitored = phase2.monitored_gauges.contains(&event.precursor.gauge);
            if monitored && !phase2.event_detections.contains_key(&event.id) {
                phase2.event_detections.insert(
                    event.id.clone(),
                    Detection {
                        stage: DetectionStage::Precursor,
                        at_s: t,
                    },
                );
                state.score += event.detection_score;

                ctx.log_system(
                    state,
                    "precursor_detected",
                    json!({
                        "event": event.id,
                        "gauge": event.precursor.gauge,
                        "stage": "precursor",
                        "at_s": t,
                        "score_change": event.detection_score,
                    }),
                )?;
                ctx.emit_room(ServerMessage::PrecursorDetected {
                    event_name: event.name.clone(),
                    gauge: event.precursor.gauge.clone(),
                    score: event.detection_score,
                    msg: format!(
                        "Precursor caught on {}: {}",
                        event.precursor.gauge, event.precursor.description
                    ),
                });
                ctx.emit_room(ServerMessage::UpdateScore { score: state.score });
            }
        } else if event.in_alert_window(t) {
            if phase2.alerted_events.insert(event.id.clone()) {
                ctx.log_system(
                    state,
                    "event_alert",
                    json!({
                        "event": event.id,
                        "severity": event.alert.severity.as_str(),
                        "message": event.alert.message,
                        "at_s": t,
                    }),
                )?;
                ctx.emit_room(ServerMessage::EventTrigger {
                    severity: event.alert.severity,
                    msg: event.alert.message.clone(),
                    progress,
                });
                ctx.hooks.notify_all(HookEvent::EventAlert {
                    event_id: event.id.clone(),
                    message: event.alert.message.clone(),
                    severity: event.alert.severity,
                });

                // Reaction credit only when the precursor was missed.
                if !phase2.event_detections.contains_key(&event.id) {
                    phase2.event_detections.insert(
                        event.id.clone(),
                        Detection {
                            stage: DetectionStage::Alert,
                            at_s: t,
                        },
                    );
                    state.score += event.reaction_score;
                    ctx.log_system(
                        state,
                        "event_reaction",
                        json!({
                            "event": event.id,
                            "stage": "alert",
                            "at_s": t,
                            "score_change": event.reaction_score,
                        }),
                    )?;
                    ctx.emit_room(ServerMessage::UpdateScore { score: state.score });
                }
            }
            hold_failure_value(phase2, event);
        } else if t >= event.event_end_s && phase2.ended_events.insert(event.id.clone()) {
            // One-time notice, whether or not the crew ever responded.
            ctx.emit_room(ServerMessage::SysMsg {
                msg: format!("{} stabilized - parameters returning to normal.", event.name),
            });
        }
    }

    ctx.emit_room(ServerMessage::FlightUpdate {
        gauges: phase2.gauge_states.iter().map(|(k, v)| (k.clone(), *v)).collect::<BTreeMap<_, _>>(),
        progress,
    });

    if t >= scenario.duration_s {
        finish_mission(state, phase2, ctx, t)?;
    }

    Ok(())
}

/// Step 1: every gauge returns to baseline with +/-1% jitter; fuel burns
/// down linearly, keeping any asymmetric-event deficit so quantity never
/// climbs back up.
fn refresh_baselines(phase2: &mut Phase2State, t: f64, rng: &mut impl Rng) {
    let scenario = phase2.scenario;
    for gauge in &data::registry().gauges {
        match gauge.baseline {
            GaugeBaseline::Single(baseline) => {
                let jitter = rng.gen_range(-BASELINE_JITTER..=BASELINE_JITTER);
                phase2
                    .gauge_states
                    .insert(gauge.id.clone(), baseline * (1.0 + jitter));
            }
            GaugeBaseline::Split { left, right } => {
                let burned = FUEL_BURN_GAL_PER_S * t;
                let extra_right: f64 = scenario
                    .events
                    .iter()
                    .filter(|ev| {
                        ev.precursor.gauge == gauge.id
                            && ev.precursor.pattern == PrecursorPattern::Asymmetric
                    })
                    .map(|ev| {
                        let active = (t.min(ev.event_end_s) - ev.precursor_start_s).max(0.0);
                        (ASYMMETRIC_MULTIPLIER - 1.0) * FUEL_BURN_GAL_PER_S * active
                    })
                    .sum();
                phase2
                    .gauge_states
                    .insert(format!("{}_left", gauge.id), (left - burned).max(0.0));
                phase2.gauge_states.insert(
                    format!("{}_right", gauge.id),
                    (right - burned - extra_right).max(0.0),
                );
            }
        }
    }
}

/// Step 2a: overwrite the event's gauge with its precursor signature.
fn apply_precursor_pattern(
    phase2: &mut Phase2State,
    event: &FlightEvent,
    t: f64,
    rng: &mut impl Rng,
) {
    let Some(gauge) = data::registry().gauge(&event.precursor.gauge) else {
        return;
    };
    let GaugeBaseline::Single(baseline) = gauge.baseline else {
        // Fuel asymmetry is computed in the baseline pass.
        return;
    };
    let dt = t - event.precursor_start_s;
    let window = (event.alert_start_s - event.precursor_start_s).max(f64::EPSILON);

    let value = match event.precursor.pattern {
        PrecursorPattern::Asymmetric => return,
        PrecursorPattern::FluctuateDown => {
            let frac = (dt / FLUCTUATE_RAMP_S).min(1.0);
            let trend = baseline - (baseline - gauge.failure_value) * frac;
            (trend + rng.gen_range(-FLUCTUATE_NOISE..=FLUCTUATE_NOISE)).max(FLUCTUATE_FLOOR)
        }
        PrecursorPattern::GradualDrop => {
            let trend = baseline - (baseline - gauge.failure_value) * (dt / window).min(1.0);
            trend.max(baseline - GRADUAL_DROP_MAX_DELTA)
        }
        PrecursorPattern::Discharge => {
            let trend = gauge.failure_value * (dt / window).min(1.0);
            (trend + rng.gen_range(-DISCHARGE_NOISE..=DISCHARGE_NOISE)).max(DISCHARGE_FLOOR)
        }
    };
    phase2.gauge_states.insert(gauge.id.clone(), value);
}

/// Step 2b: during the alert window the gauge pins at its failure value.
fn hold_failure_value(phase2: &mut Phase2State, event: &FlightEvent) {
    if event.precursor.pattern == PrecursorPattern::Asymmetric {
        // Fuel keeps draining at the asymmetric rate; nothing to pin.
        return;
    }
    if let Some(gauge) = data::registry().gauge(&event.precursor.gauge) {
        phase2
            .gauge_states
            .insert(gauge.id.clone(), gauge.failure_value);
    }
}

/// Step 5: the scenario clock ran out.
fn finish_mission(
    state: &mut RoomState,
    phase2: &mut Phase2State,
    ctx: &mut RoomCtx,
    t: f64,
) -> Result<(), GameError> {
    phase2.finished = true;
    state.phase = Phase::Ended;

    let result = if state.score > PASS_SCORE {
        "Passed"
    } else {
        "Debrief Required"
    };
    let precursor_catches = phase2
        .event_detections
        .values()
        .filter(|d| d.stage == DetectionStage::Precursor)
        .count();
    let summary = format!(
        "{} of {} events caught at the precursor stage; final score {}.",
        precursor_catches,
        phase2.scenario.events.len(),
        state.score
    );

    ctx.log_system(
        state,
        "mission_complete",
        json!({
            "scenario": phase2.scenario.key,
            "result": result,
            "score": state.score,
            "at_s": t,
            "detections": phase2.event_detections.len(),
        }),
    )?;
    ctx.emit_room(ServerMessage::MissionComplete {
        score: state.score,
        result: result.to_string(),
        summary,
    });

    tracing::info!(
        room = %state.id,
        scenario = %phase2.scenario.key,
        score = state.score,
        result = %result,
        "mission complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests;
