//! Nearest transit stop via the Overpass API

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Place, TransitFinder, TransitKind, nearest_within};
use crate::geo::Coordinate;
use crate::{Error, Result};

/// Public Overpass endpoint
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Transit finder backed by an Overpass interpreter
pub struct OverpassClient {
    client: reqwest::Client,
    url: String,
}

impl OverpassClient {
    /// Create a client for the interpreter at `url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TransitFinder for OverpassClient {
    async fn find_nearest(
        &self,
        kind: TransitKind,
        origin: Coordinate,
        radius_m: f64,
    ) -> Result<Place> {
        let query = build_query(kind, origin, radius_m);
        tracing::debug!(%kind, radius_m, "querying overpass");

        let response = self.client.post(&self.url).body(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "overpass request failed");
            return Err(Error::TransitNotFound { kind, radius_m });
        }

        let body = response.text().await?;
        let places = parse_places(&body, kind)?;
        let place = nearest_within(places, origin, radius_m)
            .ok_or(Error::TransitNotFound { kind, radius_m })?;

        tracing::info!(name = %place.name, %kind, "nearest transit stop found");
        Ok(place)
    }
}

/// Overpass QL for stops of `kind` around `origin`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn build_query(kind: TransitKind, origin: Coordinate, radius_m: f64) -> String {
    let around = format!(
        "(around:{},{},{})",
        radius_m.max(0.0).round() as u64,
        origin.latitude,
        origin.longitude
    );

    let selectors: &[&str] = match kind {
        TransitKind::Train => &[r#"node["railway"="station"]["station"!="subway"]"#],
        TransitKind::Bus => &[
            r#"node["highway"="bus_stop"]"#,
            r#"node["public_transport"="platform"]["bus"="yes"]"#,
        ],
        TransitKind::Subway => &[
            r#"node["station"="subway"]"#,
            r#"node["railway"="station"]["subway"="yes"]"#,
        ],
    };

    let body: String = selectors.iter().map(|s| format!("{s}{around};")).collect();
    format!("[out:json][timeout:25];({body});out body;")
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Parse an Overpass JSON body into named places
///
/// Elements without coordinates are skipped; unnamed ones are labelled with
/// the spoken kind.
fn parse_places(body: &str, kind: TransitKind) -> Result<Vec<Place>> {
    let response: OverpassResponse = serde_json::from_str(body)?;

    Ok(response
        .elements
        .into_iter()
        .filter_map(|el| {
            let location = Coordinate::new(el.lat?, el.lon?).ok()?;
            let name = el
                .tags
                .get("name")
                .cloned()
                .unwrap_or_else(|| kind.spoken().to_string());
            Some(Place { name, location })
        })
        .collect())
}
