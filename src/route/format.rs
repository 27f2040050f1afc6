//! Maneuver to instruction text

use super::{ManeuverKind, Step};

/// Fixed phrase spoken on arrival
pub const ARRIVAL_PHRASE: &str = "You have arrived at your destination";

/// Segments at or below this length get no "for N meters" clause
pub const DEFAULT_DISTANCE_CLAUSE_MIN_M: f64 = 20.0;

/// Street placeholder when the provider gives no name
const UNNAMED_STREET: &str = "the road";

/// Turns one route step into a spoken instruction
#[derive(Debug, Clone, Copy)]
pub struct StepFormatter {
    /// Distance clause is appended only when the segment is longer than this
    distance_clause_min_m: f64,
}

impl Default for StepFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_CLAUSE_MIN_M)
    }
}

impl StepFormatter {
    /// Create a formatter with a custom distance-clause threshold
    #[must_use]
    pub const fn new(distance_clause_min_m: f64) -> Self {
        Self {
            distance_clause_min_m,
        }
    }

    /// Format a step as a sentence
    #[must_use]
    pub fn format(&self, step: &Step) -> String {
        let street = step.street_name.as_deref().unwrap_or(UNNAMED_STREET);
        let modifier = step.modifier.as_deref().map(normalize_modifier);

        let instruction = match step.maneuver {
            ManeuverKind::Arrive => return ARRIVAL_PHRASE.to_string(),
            ManeuverKind::Depart => format!("Start by walking on {street}"),
            ManeuverKind::Turn => match modifier {
                Some(m) => format!("Turn {m} onto {street}"),
                None => format!("Turn onto {street}"),
            },
            ManeuverKind::Continue => format!("Continue on {street}"),
            ManeuverKind::Merge => format!("Merge onto {street}"),
            ManeuverKind::Ramp => format!("Take the ramp to {street}"),
            ManeuverKind::Other => {
                format!("Head {} on {street}", modifier.unwrap_or("straight"))
            }
        };

        match self.distance_clause(step.distance_meters) {
            Some(clause) => format!("{instruction} {clause}"),
            None => instruction,
        }
    }

    /// "for N meters", or nothing for short segments
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn distance_clause(&self, distance_meters: f64) -> Option<String> {
        (distance_meters > self.distance_clause_min_m)
            .then(|| format!("for {} meters", distance_meters.round() as u64))
    }
}

/// Phrase provider modifiers the way they are spoken
fn normalize_modifier(modifier: &str) -> &str {
    match modifier {
        "slight left" => "slightly left",
        "slight right" => "slightly right",
        other => other,
    }
}
