//! Phase-2 flight scenario library and the instrument gauge bank

use crate::types::{
    Alert, AlertSeverity, FlightEvent, FlightScenario, GaugeBaseline, GaugeConfig, Precursor,
    PrecursorPattern,
};

fn gauge(
    id: &str,
    name: &str,
    baseline: GaugeBaseline,
    normal_range: (f64, f64),
    unit: &str,
    failure_value: f64,
    teaching_note: &str,
) -> GaugeConfig {
    GaugeConfig {
        id: id.to_string(),
        name: name.to_string(),
        baseline,
        normal_range,
        unit: unit.to_string(),
        failure_value,
        teaching_note: teaching_note.to_string(),
    }
}

pub(super) fn gauge_bank() -> Vec<GaugeConfig> {
    vec![
        gauge(
            "airspeed",
            "Airspeed Indicator",
            GaugeBaseline::Single(105.0),
            (90.0, 120.0),
            "kt",
            80.0,
            "Pitot-static instrument. A slow unexplained decay suggests pitot icing; \
             cross-check attitude and power before chasing the needle.",
        ),
        gauge(
            "altitude",
            "Altimeter",
            GaugeBaseline::Single(5500.0),
            (5400.0, 5600.0),
            "ft",
            5500.0,
            "Static instrument. Verify the setting against ATIS; a frozen needle with \
             changing power points to static blockage.",
        ),
        gauge(
            "oil_p",
            "Oil Pressure",
            GaugeBaseline::Single(80.0),
            (60.0, 90.0),
            "psi",
            10.0,
            "The engine's lifeline. A gradual decay with stable temperature is a leak \
             or pump wear; pressure below 20 psi means land as soon as possible.",
        ),
        gauge(
            "rpm",
            "Tachometer",
            GaugeBaseline::Single(2400.0),
            (2300.0, 2500.0),
            "rpm",
            2100.0,
            "Carburetor icing announces itself as a slow RPM decay with fixed \
             throttle, often with slight roughness. Carb heat reverses it.",
        ),
        gauge(
            "fuel_qty",
            "Fuel Quantity (L/R)",
            GaugeBaseline::Split {
                left: 25.0,
                right: 25.0,
            },
            (5.0, 26.5),
            "gal",
            0.0,
            "Compare tanks, not just totals: a widening left/right split means a leak, \
             a stuck selector, or a venting problem on the fast side.",
        ),
        gauge(
            "vacuum",
            "Vacuum / Suction",
            GaugeBaseline::Single(5.0),
            (4.5, 5.5),
            "inHg",
            3.0,
            "Drives the attitude and heading gyros. Decay below 4.5 inHg makes the \
             gyros lazy long before they tumble; treat them as unreliable early.",
        ),
        gauge(
            "ammeter",
            "Ammeter",
            GaugeBaseline::Single(0.0),
            (-2.0, 2.0),
            "A",
            -12.0,
            "Near zero when the alternator carries the load. A steady negative reading \
             means the battery is discharging - shed load and plan an early landing.",
        ),
    ]
}

pub(super) fn scenario_library() -> Vec<FlightScenario> {
    vec![routine_flight(), oil_pressure_loss(), instrument_degradation()]
}

/// The canonical two-event cross-country: a fuel imbalance the crew can catch
/// on the gauges, then an alternator failure late in the leg.
fn routine_flight() -> FlightScenario {
    FlightScenario {
        key: "routine_flight".to_string(),
        name: "Routine Cross-Country".to_string(),
        duration_s: 180.0,
        events: vec![
            FlightEvent {
                id: "fuel_imbalance".to_string(),
                name: "Fuel Imbalance".to_string(),
                precursor_start_s: 15.0,
                alert_start_s: 35.0,
                event_end_s: 60.0,
                precursor: Precursor {
                    gauge: "fuel_qty".to_string(),
                    pattern: PrecursorPattern::Asymmetric,
                    description: "Right tank draining three times faster than the left"
                        .to_string(),
                },
                alert: Alert {
                    severity: AlertSeverity::Warning,
                    message: "FUEL IMBALANCE".to_string(),
                },
                detection_score: 20,
                reaction_score: 10,
            },
            FlightEvent {
                id: "alternator_discharge".to_string(),
                name: "Alternator Discharge".to_string(),
                precursor_start_s: 100.0,
                alert_start_s: 130.0,
                event_end_s: 160.0,
                precursor: Precursor {
                    gauge: "ammeter".to_string(),
                    pattern: PrecursorPattern::Discharge,
                    description: "Ammeter drifting steadily negative".to_string(),
                },
                alert: Alert {
                    severity: AlertSeverity::Caution,
                    message: "ALTERNATOR FAILURE - BATTERY DISCHARGING".to_string(),
                },
                detection_score: 20,
                reaction_score: 10,
            },
        ],
        acceptable_qrh: vec!["fuel_imbalance".to_string(), "alternator_failure".to_string()],
    }
}

fn oil_pressure_loss() -> FlightScenario {
    FlightScenario {
        key: "oil_pressure_loss".to_string(),
        name: "Oil Pressure Emergency".to_string(),
        duration_s: 150.0,
        events: vec![
            FlightEvent {
                id: "oil_pressure_decay".to_string(),
                name: "Oil Pressure Decay".to_string(),
                precursor_start_s: 20.0,
                alert_start_s: 50.0,
                event_end_s: 90.0,
                precursor: Precursor {
                    gauge: "oil_p".to_string(),
                    pattern: PrecursorPattern::GradualDrop,
                    description: "Oil pressure ramping down with stable temperature"
                        .to_string(),
                },
                alert: Alert {
                    severity: AlertSeverity::Failure,
                    message: "OIL PRESSURE LOST".to_string(),
                },
                detection_score: 25,
                reaction_score: 10,
            },
            FlightEvent {
                id: "carb_icing".to_string(),
                name: "Carburetor Icing".to_string(),
                precursor_start_s: 105.0,
                alert_start_s: 125.0,
                event_end_s: 145.0,
                precursor: Precursor {
                    gauge: "rpm".to_string(),
                    pattern: PrecursorPattern::FluctuateDown,
                    description: "RPM sagging and fluctuating at fixed throttle".to_string(),
                },
                alert: Alert {
                    severity: AlertSeverity::Caution,
                    message: "CARBURETOR ICING - RPM DECAY".to_string(),
                },
                detection_score: 15,
                reaction_score: 5,
            },
        ],
        acceptable_qrh: vec![
            "low_oil_pressure".to_string(),
            "carburetor_icing".to_string(),
        ],
    }
}

fn instrument_degradation() -> FlightScenario {
    FlightScenario {
        key: "instrument_degradation".to_string(),
        name: "Instrument and Electrical Degradation".to_string(),
        duration_s: 200.0,
        events: vec![
            FlightEvent {
                id: "vacuum_decay".to_string(),
                name: "Vacuum System Decay".to_string(),
                precursor_start_s: 30.0,
                alert_start_s: 60.0,
                event_end_s: 90.0,
                precursor: Precursor {
                    gauge: "vacuum".to_string(),
                    pattern: PrecursorPattern::GradualDrop,
                    description: "Suction bleeding down toward the red arc".to_string(),
                },
                alert: Alert {
                    severity: AlertSeverity::Caution,
                    message: "VACUUM SYSTEM FAILURE".to_string(),
                },
                detection_score: 20,
                reaction_score: 10,
            },
            FlightEvent {
                id: "alternator_failure".to_string(),
                name: "Alternator Failure".to_string(),
                precursor_start_s: 120.0,
                alert_start_s: 150.0,
                event_end_s: 180.0,
                precursor: Precursor {
                    gauge: "ammeter".to_string(),
                    pattern: PrecursorPattern::Discharge,
                    description: "Battery discharge accelerating under load".to_string(),
                },
                alert: Alert {
                    severity: AlertSeverity::Warning,
                    message: "ALTERNATOR FAILURE".to_string(),
                },
                detection_score: 20,
                reaction_score: 10,
            },
        ],
        acceptable_qrh: vec![
            "vacuum_failure".to_string(),
            "alternator_failure".to_string(),
        ],
    }
}
