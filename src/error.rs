//! Error types for Sightline

use thiserror::Error;

use crate::providers::TransitKind;

/// Result type alias for Sightline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Sightline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Coordinate outside the valid latitude/longitude ranges
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Route with no steps
    #[error("route has no usable steps")]
    EmptyRoute,

    /// Step whose distance is negative or not finite
    #[error("invalid route step {index}: distance {distance_meters}")]
    InvalidStep {
        /// Position of the step in the route
        index: usize,
        distance_meters: f64,
    },

    /// No walking path between the requested points
    #[error("route unavailable: {0}")]
    RouteUnavailable(String),

    /// No position fix yet and no fallback location configured
    #[error("location unavailable")]
    LocationUnavailable,

    /// No point of interest of the requested kind within the search radius
    #[error("no {kind} found within {radius_m} m")]
    TransitNotFound {
        /// Kind that was searched for
        kind: TransitKind,
        /// Search radius in meters
        radius_m: f64,
    },

    /// Malformed scenario script
    #[error("scenario line {line}: {reason}")]
    InvalidScenario {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Daemon is no longer accepting events
    #[error("daemon is not running")]
    DaemonStopped,

    /// Voice engine failed to produce an utterance
    #[error("speech error: {0}")]
    Speech(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
