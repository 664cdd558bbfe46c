//! Quick Reference Handbook checklist library

use crate::types::QrhChecklist;

fn checklist(key: &str, title: &str, items: &[&str], goal: &str) -> QrhChecklist {
    QrhChecklist {
        key: key.to_string(),
        title: title.to_string(),
        items: items.iter().map(|s| s.to_string()).collect(),
        goal: goal.to_string(),
    }
}

pub(super) fn qrh_library() -> Vec<QrhChecklist> {
    vec![
        checklist(
            "low_oil_pressure",
            "LOW OIL PRESSURE",
            &[
                "Throttle - REDUCE",
                "Landing Area - SELECT",
                "Prepare - FOR ENGINE FAILURE",
            ],
            "Minimize engine load and be positioned to land before seizure",
        ),
        checklist(
            "engine_fire",
            "ENGINE FIRE IN FLIGHT",
            &[
                "Mixture - CUTOFF",
                "Fuel Valve - OFF",
                "Master Switch - OFF",
                "Cabin Heat - OFF",
                "Airspeed - 105 KIAS",
            ],
            "Starve the fire of fuel and air, then land immediately",
        ),
        checklist(
            "electrical_fire",
            "ELECTRICAL FIRE",
            &[
                "Master Switch - OFF",
                "Vents/Cabin Air - CLOSED",
                "Fire Extinguisher - ACTIVATE",
                "Avionics - OFF",
            ],
            "Remove the ignition source and suppress the fire",
        ),
        checklist(
            "carburetor_icing",
            "CARBURETOR ICING",
            &[
                "Carburetor Heat - FULL ON",
                "Throttle - OPEN slowly",
                "Monitor - RPM RECOVERY",
                "Mixture - ADJUST",
            ],
            "Melt induction ice before it chokes the engine",
        ),
        checklist(
            "fuel_imbalance",
            "FUEL IMBALANCE",
            &[
                "Fuel Selector - SWITCH to fuller tank",
                "Cross-feed - OPEN (if available)",
                "Monitor - FUEL QTY",
                "Plan - EARLY LANDING if severe",
            ],
            "Stop feeding from the fast tank and preserve usable fuel",
        ),
        checklist(
            "vacuum_failure",
            "VACUUM SYSTEM FAILURE",
            &[
                "Verify - ATTITUDE INDICATOR unreliable",
                "Use - TURN COORDINATOR for bank",
                "Refer - MAGNETIC COMPASS",
                "Avoid - IMC if possible",
            ],
            "Fly partial panel before the failed gyros mislead you",
        ),
        checklist(
            "alternator_failure",
            "ALTERNATOR FAILURE",
            &[
                "Alternator - CYCLE (OFF then ON)",
                "If no recovery - SHED LOAD",
                "Avionics - MINIMIZE",
                "Battery - MONITOR voltage",
                "Plan - NEAREST AIRPORT",
            ],
            "Stretch remaining battery life to a landing with radios",
        ),
    ]
}
