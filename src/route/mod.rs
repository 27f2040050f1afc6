//! Route model
//!
//! A [`Route`] is an ordered, non-empty list of [`Step`]s received from a
//! route provider. Routes are never mutated after construction; a new route
//! request replaces the whole value.

mod format;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::{Error, Result};

pub use format::{ARRIVAL_PHRASE, DEFAULT_DISTANCE_CLAUSE_MIN_M, StepFormatter};

/// Kind of maneuver attached to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverKind {
    /// First step of a route
    Depart,
    /// Turn at an intersection
    Turn,
    /// Keep going on the same or a renamed street
    Continue,
    /// Merge onto a street
    Merge,
    /// On or off ramp
    Ramp,
    /// Final step
    Arrive,
    /// Anything else the provider reports (forks, roundabouts, ...)
    Other,
}

impl ManeuverKind {
    /// Map an OSRM maneuver type string
    #[must_use]
    pub fn from_osrm(kind: &str) -> Self {
        match kind {
            "depart" => Self::Depart,
            "turn" | "end of road" => Self::Turn,
            "continue" | "new name" => Self::Continue,
            "merge" => Self::Merge,
            "on ramp" | "off ramp" => Self::Ramp,
            "arrive" => Self::Arrive,
            _ => Self::Other,
        }
    }
}

/// One routing instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// What the user should do
    pub maneuver: ManeuverKind,
    /// Direction qualifier (e.g. "left", "slight right")
    #[serde(default)]
    pub modifier: Option<String>,
    /// Street the maneuver leads onto
    #[serde(default)]
    pub street_name: Option<String>,
    /// Length of the segment following the maneuver
    pub distance_meters: f64,
    /// Where the maneuver happens
    pub location: Coordinate,
}

impl Step {
    /// Create a step with no modifier or street name
    #[must_use]
    pub const fn new(maneuver: ManeuverKind, distance_meters: f64, location: Coordinate) -> Self {
        Self {
            maneuver,
            modifier: None,
            street_name: None,
            distance_meters,
            location,
        }
    }

    /// Set the modifier
    #[must_use]
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    /// Set the street name
    #[must_use]
    pub fn with_street(mut self, street_name: impl Into<String>) -> Self {
        self.street_name = Some(street_name.into());
        self
    }
}

/// An ordered, non-empty sequence of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteParts")]
pub struct Route {
    steps: Vec<Step>,
    total_distance_meters: f64,
    total_duration_seconds: f64,
}

/// Unvalidated wire form of [`Route`]
#[derive(Deserialize)]
struct RouteParts {
    steps: Vec<Step>,
    #[serde(default)]
    total_distance_meters: Option<f64>,
    #[serde(default)]
    total_duration_seconds: f64,
}

impl TryFrom<RouteParts> for Route {
    type Error = Error;

    fn try_from(parts: RouteParts) -> Result<Self> {
        let total = parts
            .total_distance_meters
            .unwrap_or_else(|| parts.steps.iter().map(|s| s.distance_meters).sum());
        Self::new(parts.steps, total, parts.total_duration_seconds)
    }
}

impl Route {
    /// Create a route
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyRoute` if there are no steps,
    /// `Error::InvalidStep` if a step distance is negative or non-finite, and
    /// `Error::InvalidCoordinate` for a step with an out-of-range location
    pub fn new(
        steps: Vec<Step>,
        total_distance_meters: f64,
        total_duration_seconds: f64,
    ) -> Result<Self> {
        if steps.is_empty() {
            return Err(Error::EmptyRoute);
        }

        for (index, step) in steps.iter().enumerate() {
            if !step.distance_meters.is_finite() || step.distance_meters < 0.0 {
                return Err(Error::InvalidStep {
                    index,
                    distance_meters: step.distance_meters,
                });
            }
            step.location.validate()?;
        }

        Ok(Self {
            steps,
            total_distance_meters: total_distance_meters.max(0.0),
            total_duration_seconds: total_duration_seconds.max(0.0),
        })
    }

    /// All steps in order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Step at `index`
    #[must_use]
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Number of steps (always at least one)
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept alongside `len` for API symmetry
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the final step
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    /// Total walking distance
    #[must_use]
    pub const fn total_distance_meters(&self) -> f64 {
        self.total_distance_meters
    }

    /// Estimated walking time
    #[must_use]
    pub const fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> Coordinate {
        Coordinate::new(40.0, -73.0).unwrap()
    }

    #[test]
    fn test_empty_route_rejected() {
        assert!(matches!(Route::new(vec![], 0.0, 0.0), Err(Error::EmptyRoute)));
    }

    #[test]
    fn test_bad_step_distance_names_the_step() {
        let steps = vec![
            Step::new(ManeuverKind::Depart, 10.0, here()),
            Step::new(ManeuverKind::Turn, -1.0, here()),
        ];
        let err = Route::new(steps, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidStep { index: 1, .. }));
        assert_eq!(err.to_string(), "invalid route step 1: distance -1");

        let step = Step::new(ManeuverKind::Depart, f64::INFINITY, here());
        assert!(matches!(
            Route::new(vec![step], 0.0, 0.0),
            Err(Error::InvalidStep { index: 0, .. })
        ));
    }

    #[test]
    fn test_route_accessors() {
        let route = Route::new(
            vec![
                Step::new(ManeuverKind::Depart, 100.0, here()),
                Step::new(ManeuverKind::Arrive, 0.0, here()),
            ],
            100.0,
            80.0,
        )
        .unwrap();

        assert_eq!(route.len(), 2);
        assert_eq!(route.last_index(), 1);
        assert!(!route.is_empty());
        assert_eq!(route.step(1).map(|s| s.maneuver), Some(ManeuverKind::Arrive));
        assert!(route.step(2).is_none());
    }

    #[test]
    fn test_osrm_maneuver_mapping() {
        assert_eq!(ManeuverKind::from_osrm("depart"), ManeuverKind::Depart);
        assert_eq!(ManeuverKind::from_osrm("new name"), ManeuverKind::Continue);
        assert_eq!(ManeuverKind::from_osrm("off ramp"), ManeuverKind::Ramp);
        assert_eq!(ManeuverKind::from_osrm("roundabout"), ManeuverKind::Other);
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"steps": []}"#;
        assert!(serde_json::from_str::<Route>(json).is_err());

        let json = r#"{
            "steps": [
                {"maneuver": "depart", "street_name": "Main St", "distance_meters": 40.0,
                 "location": {"latitude": 40.0, "longitude": -73.0}},
                {"maneuver": "arrive", "distance_meters": 0.0,
                 "location": {"latitude": 40.0004, "longitude": -73.0}}
            ]
        }"#;
        let route: Route = serde_json::from_str(json).unwrap();
        assert_eq!(route.len(), 2);
        assert!((route.total_distance_meters() - 40.0).abs() < f64::EPSILON);
        assert_eq!(route.steps()[0].street_name.as_deref(), Some("Main St"));
    }
}
