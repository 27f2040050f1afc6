//! OSRM walking routes

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::RouteProvider;
use crate::geo::Coordinate;
use crate::route::{ManeuverKind, Route, Step};
use crate::{Error, Result};

/// Public OSRM demo server
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Route provider backed by an OSRM HTTP server
pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    /// Create a client for the server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn route_url(&self, start: Coordinate, end: Coordinate) -> String {
        // OSRM takes lon,lat pairs
        format!(
            "{}/route/v1/foot/{},{};{},{}?steps=true&overview=false",
            self.base_url, start.longitude, start.latitude, end.longitude, end.latitude
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmClient {
    async fn walking_route(&self, start: Coordinate, end: Coordinate) -> Result<Route> {
        let url = self.route_url(start, end);
        tracing::debug!(%url, "requesting walking route");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // OSRM answers NoRoute with a 400 and a JSON body
        if !status.is_success() && !body.trim_start().starts_with('{') {
            return Err(Error::RouteUnavailable(format!("OSRM error {status}: {body}")));
        }

        let route = parse_route(&body)?;
        tracing::info!(
            steps = route.len(),
            distance_m = route.total_distance_meters(),
            "walking route received"
        );
        Ok(route)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
    /// `[longitude, latitude]`
    location: [f64; 2],
}

/// Parse an OSRM `/route` response body into a [`Route`]
///
/// Multi-leg routes are flattened into one step list.
fn parse_route(body: &str) -> Result<Route> {
    let response: OsrmResponse = serde_json::from_str(body)?;

    if response.code != "Ok" {
        return Err(Error::RouteUnavailable(
            response.message.unwrap_or(response.code),
        ));
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| Error::RouteUnavailable("no routes in response".to_string()))?;

    let steps = route
        .legs
        .into_iter()
        .flat_map(|leg| leg.steps)
        .map(|step| {
            let [lon, lat] = step.maneuver.location;
            let location = Coordinate::new(lat, lon)?;
            Ok(Step {
                maneuver: ManeuverKind::from_osrm(&step.maneuver.kind),
                modifier: step.maneuver.modifier,
                street_name: (!step.name.is_empty()).then_some(step.name),
                distance_meters: step.distance,
                location,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if steps.is_empty() {
        return Err(Error::RouteUnavailable("route has no steps".to_string()));
    }

    Route::new(steps, route.distance, route.duration)
}
