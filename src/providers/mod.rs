//! Routing and points-of-interest providers
//!
//! The guidance core only sees the [`RouteProvider`] and [`TransitFinder`]
//! traits. HTTP-backed implementations talk to OSRM and the Overpass API.

mod osrm;
mod overpass;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::route::Route;
use crate::{Error, Result};

pub use osrm::{DEFAULT_OSRM_URL, OsrmClient};
pub use overpass::{DEFAULT_OVERPASS_URL, OverpassClient};

/// Kind of transit stop the user can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitKind {
    /// Railway station
    Train,
    /// Bus stop
    Bus,
    /// Subway / metro station
    Subway,
}

impl TransitKind {
    /// How the kind is spoken ("train station", "bus stop", ...)
    #[must_use]
    pub const fn spoken(self) -> &'static str {
        match self {
            Self::Train => "train station",
            Self::Bus => "bus stop",
            Self::Subway => "subway station",
        }
    }
}

impl fmt::Display for TransitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spoken())
    }
}

impl FromStr for TransitKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "train" | "rail" | "railway" => Ok(Self::Train),
            "bus" => Ok(Self::Bus),
            "subway" | "metro" | "underground" => Ok(Self::Subway),
            other => Err(Error::Config(format!("unknown transit kind: {other}"))),
        }
    }
}

/// A named point of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Display name (falls back to the kind when unnamed)
    pub name: String,
    /// Where it is
    pub location: Coordinate,
}

/// Builds walking routes between two points
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Fetch a walking route
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteUnavailable` when no path exists, or a transport
    /// error when the provider cannot be reached
    async fn walking_route(&self, start: Coordinate, end: Coordinate) -> Result<Route>;
}

/// Finds the nearest transit stop of a kind
#[async_trait]
pub trait TransitFinder: Send + Sync {
    /// Find the closest stop within `radius_m` of `origin`
    ///
    /// # Errors
    ///
    /// Returns `Error::TransitNotFound` when nothing is in range
    async fn find_nearest(
        &self,
        kind: TransitKind,
        origin: Coordinate,
        radius_m: f64,
    ) -> Result<Place>;
}

/// Route provider that always returns the same route
///
/// Used by scenario replay, where the route is part of the script.
#[derive(Debug, Clone, Default)]
pub struct StaticRouteProvider {
    route: Option<Route>,
}

impl StaticRouteProvider {
    /// Serve `route` for every request
    #[must_use]
    pub const fn new(route: Route) -> Self {
        Self { route: Some(route) }
    }

    /// Provider that never finds a route
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { route: None }
    }
}

#[async_trait]
impl RouteProvider for StaticRouteProvider {
    async fn walking_route(&self, _start: Coordinate, _end: Coordinate) -> Result<Route> {
        self.route
            .clone()
            .ok_or_else(|| Error::RouteUnavailable("no scripted route".to_string()))
    }
}

/// Transit finder over a fixed list of places
#[derive(Debug, Clone, Default)]
pub struct StaticTransitFinder {
    places: Vec<(TransitKind, Place)>,
}

impl StaticTransitFinder {
    /// Create a finder over `places`
    #[must_use]
    pub const fn new(places: Vec<(TransitKind, Place)>) -> Self {
        Self { places }
    }
}

#[async_trait]
impl TransitFinder for StaticTransitFinder {
    async fn find_nearest(
        &self,
        kind: TransitKind,
        origin: Coordinate,
        radius_m: f64,
    ) -> Result<Place> {
        nearest_within(
            self.places
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, p)| p.clone()),
            origin,
            radius_m,
        )
        .ok_or(Error::TransitNotFound { kind, radius_m })
    }
}

/// Closest candidate within `radius_m` of `origin`
fn nearest_within(
    candidates: impl IntoIterator<Item = Place>,
    origin: Coordinate,
    radius_m: f64,
) -> Option<Place> {
    candidates
        .into_iter()
        .map(|p| (origin.distance_to(&p.location), p))
        .filter(|(d, _)| *d <= radius_m)
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, p)| p)
}
