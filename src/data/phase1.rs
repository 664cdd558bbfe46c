//! Phase-1 dispatch briefing: documents, threats, and the emergency quiz
//!
//! A VFR cross-country dispatch package for a C172 crew. Each threat is
//! planted in one of the briefing documents; the keyword is the exact string
//! the PF clicks in the document viewer.

use crate::types::{
    BriefingDoc, Phase1Scenario, QuizQuestion, ResponseOption, ScoreMatrix, SopGuide, Threat,
};

fn opt(id: &str, text: &str, is_correct: bool) -> ResponseOption {
    ResponseOption {
        id: id.to_string(),
        text: text.to_string(),
        is_correct,
    }
}

/// Standard scoring for a threat decision: the double-failure cell dominates.
const STANDARD_SCORES: ScoreMatrix = ScoreMatrix {
    pf_correct_pm_approve: 15,
    pf_correct_pm_reject: -5,
    pf_wrong_pm_approve: -20,
    pf_wrong_pm_reject: 5,
};

pub(super) fn dispatch_briefing() -> Phase1Scenario {
    Phase1Scenario {
        key: "standard_dispatch".to_string(),
        name: "Cold Morning VFR Cross-Country".to_string(),
        briefing: briefing_docs(),
        threats: threats(),
        quiz: emergency_quiz(),
    }
}

fn briefing_docs() -> Vec<BriefingDoc> {
    vec![
        BriefingDoc {
            source: "OFP".to_string(),
            title: "Operational Flight Plan".to_string(),
            content: "Route: KPAO -> KMRY direct, cruise 5,500 ft.\n\
                      Endurance: 4.2 h at 9.5 gph, reserve 1.0 h.\n\
                      Remarks: medical courier on board, on-time arrival requested."
                .to_string(),
        },
        BriefingDoc {
            source: "WEATHER".to_string(),
            title: "METAR & TAF".to_string(),
            content: "KPAO 261450Z 24015G25KT 9999 FEW030 08/02 A3002\n\
                      KMRY 261450Z 20005KT 5SM BR SCT010 BKN020\n\
                      TAF KMRY ... TEMPO 1518 2SM BR BKN008"
                .to_string(),
        },
        BriefingDoc {
            source: "TECH_LOG".to_string(),
            title: "Aircraft Technical Log".to_string(),
            content: "Item: Landing_Light_U/S - landing light inoperative.\n\
                      Status: deferred per MEL 33-42-01, day VFR only.\n\
                      Item: aircraft cold-soaked overnight at -6 C, see \
                      Recovering_from_Cold procedures before first start."
                .to_string(),
        },
        BriefingDoc {
            source: "NOTAMS".to_string(),
            title: "Notices to Airmen".to_string(),
            content: "KPAO RWY 31 shortened 400 ft for construction until 2200Z.\n\
                      KMRY ILS RWY 10R unserviceable."
                .to_string(),
        },
    ]
}

fn threats() -> Vec<Threat> {
    vec![
        Threat {
            keyword: "24015G25KT".to_string(),
            description: "Departure wind 240 at 15 gusting 25 knots - a 10-knot \
                          gust spread close to the demonstrated crosswind limit."
                .to_string(),
            options: vec![
                opt(
                    "standard_procedure",
                    "Apply the gusty-wind takeoff procedure: add half the gust factor \
                     to rotation speed and brief a low-level abort window",
                    true,
                ),
                opt(
                    "normal_takeoff",
                    "Fly a normal takeoff; the gust spread is within book numbers",
                    false,
                ),
                opt(
                    "ignore",
                    "No action needed, wind is mostly down the runway",
                    false,
                ),
            ],
            sop: SopGuide {
                title: "SOP 3-2: Gusty Wind Takeoff".to_string(),
                bullets: vec![
                    "Add one half of the gust factor to Vr and approach speed".to_string(),
                    "Hold aileron into wind through the takeoff roll".to_string(),
                    "Brief the abort criteria before entering the runway".to_string(),
                ],
            },
            scores: STANDARD_SCORES,
        },
        Threat {
            keyword: "Landing_Light_U/S".to_string(),
            description: "Landing light deferred under the MEL. Legal for day VFR, \
                          but the flight must not extend past civil twilight."
                .to_string(),
            options: vec![
                opt(
                    "confirm_daylight_window",
                    "Check the MEL restriction, compute latest off-block time for a \
                     daylight arrival, and brief the hard turnaround time",
                    true,
                ),
                opt(
                    "daylight_ok",
                    "It is daytime now, so the deferred light needs no further action",
                    false,
                ),
                opt(
                    "cancel_flight",
                    "Cancel the flight; an inoperative landing light is a no-go item",
                    false,
                ),
            ],
            sop: SopGuide {
                title: "SOP 1-7: MEL Dispatch Review".to_string(),
                bullets: vec![
                    "Confirm the deferral category and its operational limits".to_string(),
                    "Translate limits into concrete times and brief them".to_string(),
                    "Record the restriction on the OFP".to_string(),
                ],
            },
            scores: STANDARD_SCORES,
        },
        Threat {
            keyword: "Recovering_from_Cold".to_string(),
            description: "Airframe cold-soaked at -6 C overnight: congealed oil and a \
                          weak battery make a normal-start attempt risky."
                .to_string(),
            options: vec![
                opt(
                    "preheat_and_check",
                    "Request engine preheat, use the cold-weather start checklist and \
                     verify oil pressure rise within 30 seconds",
                    true,
                ),
                opt(
                    "extended_warmup",
                    "Start normally and simply warm the engine up longer before runup",
                    false,
                ),
                opt(
                    "ignore",
                    "Temperatures are above the placard minimum, start normally",
                    false,
                ),
            ],
            sop: SopGuide {
                title: "SOP 2-4: Cold Weather Operations".to_string(),
                bullets: vec![
                    "Preheat required below -5 C cold-soak".to_string(),
                    "Use the cold-weather start flow; limit cranking to 10 seconds".to_string(),
                    "Abort the start if oil pressure is not rising within 30 seconds".to_string(),
                ],
            },
            scores: STANDARD_SCORES,
        },
    ]
}

fn emergency_quiz() -> Vec<QuizQuestion> {
    vec![
        QuizQuestion {
            id: "q_engine_fire_start".to_string(),
            question: "Engine fire during start. First action?".to_string(),
            options: vec![
                opt("a", "Continue cranking to suck the fire into the engine", true),
                opt("b", "Mixture full rich and throttle open", false),
                opt("c", "Evacuate immediately", false),
                opt("d", "Master switch off, then crank", false),
            ],
            explanation: "Continued cranking draws the fire into the induction system; \
                          evacuation comes only if the fire persists."
                .to_string(),
        },
        QuizQuestion {
            id: "q_engine_failure_glide".to_string(),
            question: "Engine failure in cruise. The first memory item is:".to_string(),
            options: vec![
                opt("a", "Squawk 7700", false),
                opt("b", "Establish best-glide speed", true),
                opt("c", "Attempt a restart", false),
                opt("d", "Secure the fuel system", false),
            ],
            explanation: "Airspeed is life: trim for best glide before any \
                          troubleshooting or radio work."
                .to_string(),
        },
        QuizQuestion {
            id: "q_electrical_fire".to_string(),
            question: "Electrical fire in flight with smoke in the cabin. First action?"
                .to_string(),
            options: vec![
                opt("a", "Open all vents to clear the smoke", false),
                opt("b", "Master switch off", true),
                opt("c", "Land immediately regardless of terrain", false),
                opt("d", "Pull every circuit breaker one by one", false),
            ],
            explanation: "Removing electrical power removes the ignition source; \
                          ventilation comes after the fire is out."
                .to_string(),
        },
    ]
}
