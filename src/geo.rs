//! Geodesic helpers
//!
//! Pure functions over WGS84 decimal-degree coordinates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CoordinateParts")]
pub struct Coordinate {
    /// Latitude, -90..=90
    pub latitude: f64,
    /// Longitude, -180..=180
    pub longitude: f64,
}

/// Unvalidated wire form of [`Coordinate`]
#[derive(Deserialize)]
struct CoordinateParts {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<CoordinateParts> for Coordinate {
    type Error = Error;

    fn try_from(parts: CoordinateParts) -> Result<Self> {
        Self::new(parts.latitude, parts.longitude)
    }
}

impl Coordinate {
    /// Create a validated coordinate
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCoordinate` if either component is non-finite or
    /// outside its range
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self {
            latitude,
            longitude,
        };
        coord.validate()?;
        Ok(coord)
    }

    /// Check the latitude/longitude ranges
    ///
    /// Deserialization already checks this; values built from the public
    /// fields do not.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCoordinate` when out of range
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidCoordinate(format!(
                "latitude {} outside -90..=90",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidCoordinate(format!(
                "longitude {} outside -180..=180",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Great-circle distance to another coordinate in meters
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance_meters(*self, *other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Parses `"lat,lon"` as used on the command line and in env vars
impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| Error::InvalidCoordinate(format!("expected \"lat,lon\", got {s:?}")))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| Error::InvalidCoordinate(format!("{part:?}: {e}")))
        };

        Self::new(parse(lat)?, parse(lon)?)
    }
}

/// Haversine distance between two coordinates in meters
///
/// Symmetric, zero for identical points, and finite for antipodal input.
#[must_use]
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let sin_dlat = (delta_lat / 2.0).sin();
    let sin_dlon = (delta_lon / 2.0).sin();
    // Rounding can push the term a hair past 1 for antipodal points
    let h = lat2
        .cos()
        .mul_add(lat1.cos() * sin_dlon * sin_dlon, sin_dlat * sin_dlat)
        .clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = distance_meters(coord(35.0, 139.0), coord(36.0, 139.0));
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (coord(51.5007, -0.1246), coord(48.8584, 2.2945)),
            (coord(-33.8568, 151.2153), coord(40.6892, -74.0445)),
            (coord(0.0, 179.9), coord(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            let ab = distance_meters(a, b);
            let ba = distance_meters(b, a);
            assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
        }
    }

    #[test]
    fn test_same_point_is_zero() {
        let a = coord(40.7128, -74.0060);
        assert!(distance_meters(a, a).abs() < 1e-9);
    }

    #[test]
    fn test_antipodal_is_finite() {
        let d = distance_meters(coord(0.0, 0.0), coord(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn test_dateline_crossing_is_short() {
        let d = distance_meters(coord(0.0, 179.9999), coord(0.0, -179.9999));
        assert!(d < 50.0, "got {d}");
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_deserialize_checks_range() {
        let ok: Coordinate =
            serde_json::from_str(r#"{"latitude": 40.75, "longitude": -73.99}"#).unwrap();
        assert!((ok.latitude - 40.75).abs() < f64::EPSILON);

        let err = serde_json::from_str::<Coordinate>(r#"{"latitude": 95.0, "longitude": 0.0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("latitude 95"), "{err}");
    }

    #[test]
    fn test_parse_from_str() {
        let c: Coordinate = " 40.75, -73.99 ".parse().unwrap();
        assert!((c.latitude - 40.75).abs() < f64::EPSILON);
        assert!((c.longitude + 73.99).abs() < f64::EPSILON);

        assert!("40.75".parse::<Coordinate>().is_err());
        assert!("north,south".parse::<Coordinate>().is_err());
        assert!("95,0".parse::<Coordinate>().is_err());
    }
}
