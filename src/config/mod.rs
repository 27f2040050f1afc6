//! Configuration management for Sightline
//!
//! Precedence: environment, then the TOML file, then built-in defaults.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::detection::{DEFAULT_DETECTION_CLASSES, DEFAULT_MIN_CONFIDENCE};
use crate::geo::Coordinate;
use crate::navigation::{DEFAULT_ARRIVAL_RADIUS_M, DEFAULT_TURN_RADIUS_M, NavigationSettings};
use crate::providers::{DEFAULT_OSRM_URL, DEFAULT_OVERPASS_URL};
use crate::throttle::DEFAULT_COOLDOWN_MS;
use crate::voice::{TtsProvider, VoiceType};
use crate::{Error, Result};

pub use file::{SightlineConfigFile, config_file_path, load_config_file, load_config_file_from};

/// Default detection polling period
pub const DEFAULT_DETECTION_INTERVAL_MS: u64 = 2_000;

/// Default transit search radius
pub const DEFAULT_TRANSIT_RADIUS_M: f64 = 1_000.0;

/// Default timeout for routing and lookup requests
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Sightline configuration
#[derive(Debug)]
pub struct Config {
    pub guidance: GuidanceConfig,
    pub detection: DetectionConfig,
    pub voice: VoiceConfig,
    pub providers: ProvidersConfig,
}

/// Navigation tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceConfig {
    /// Shared announcement cooldown
    pub cooldown_ms: u64,
    pub turn_radius_m: f64,
    pub arrival_radius_m: f64,
    /// Routing origin before the first position fix
    pub default_location: Option<Coordinate>,
}

/// Object announcement tuning
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub classes: Vec<String>,
    pub min_confidence: f32,
    pub interval_ms: u64,
}

/// Voice engine selection
#[derive(Debug)]
pub struct VoiceConfig {
    /// Remote synthesis backend; `None` speaks to the console
    pub provider: Option<TtsProvider>,
    pub voice_type: VoiceType,
    /// Provider voice override; otherwise derived from `voice_type`
    pub tts_voice: Option<String>,
    pub tts_speed: f32,
    pub openai_api_key: Option<SecretString>,
    pub elevenlabs_api_key: Option<SecretString>,
}

/// External service endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct ProvidersConfig {
    pub osrm_url: String,
    pub overpass_url: String,
    pub transit_radius_m: f64,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or out of range
    pub fn load() -> Result<Self> {
        Self::from_sources(load_config_file(), &|key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or out of range
    pub fn from_sources(
        fc: SightlineConfigFile,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let guidance = GuidanceConfig {
            cooldown_ms: parse_env(env, "SIGHTLINE_COOLDOWN_MS")?
                .or(fc.guidance.cooldown_ms)
                .unwrap_or(DEFAULT_COOLDOWN_MS),
            turn_radius_m: parse_env(env, "SIGHTLINE_TURN_RADIUS_M")?
                .or(fc.guidance.turn_radius_m)
                .unwrap_or(DEFAULT_TURN_RADIUS_M),
            arrival_radius_m: parse_env(env, "SIGHTLINE_ARRIVAL_RADIUS_M")?
                .or(fc.guidance.arrival_radius_m)
                .unwrap_or(DEFAULT_ARRIVAL_RADIUS_M),
            default_location: env("SIGHTLINE_DEFAULT_LOCATION")
                .or(fc.guidance.default_location)
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.parse::<Coordinate>()
                        .map_err(|e| Error::Config(format!("default location: {e}")))
                })
                .transpose()?,
        };

        let detection = DetectionConfig {
            classes: env("SIGHTLINE_DETECTION_CLASSES")
                .map(|s| {
                    s.split(',')
                        .map(|c| c.trim().to_lowercase())
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .or(fc.detection.classes)
                .unwrap_or_else(|| {
                    DEFAULT_DETECTION_CLASSES
                        .iter()
                        .map(ToString::to_string)
                        .collect()
                }),
            min_confidence: parse_env(env, "SIGHTLINE_MIN_CONFIDENCE")?
                .or(fc.detection.min_confidence)
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            interval_ms: parse_env(env, "SIGHTLINE_DETECTION_INTERVAL_MS")?
                .or(fc.detection.interval_ms)
                .unwrap_or(DEFAULT_DETECTION_INTERVAL_MS),
        };

        let voice = VoiceConfig {
            provider: parse_env(env, "SIGHTLINE_TTS_PROVIDER")?.or(fc
                .voice
                .provider
                .as_deref()
                .map(str::parse::<TtsProvider>)
                .transpose()?),
            voice_type: parse_env(env, "SIGHTLINE_VOICE_TYPE")?
                .or(fc
                    .voice
                    .voice_type
                    .as_deref()
                    .map(str::parse::<VoiceType>)
                    .transpose()?)
                .unwrap_or_default(),
            tts_voice: env("SIGHTLINE_TTS_VOICE").or(fc.voice.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            openai_api_key: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            elevenlabs_api_key: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
        };

        let providers = ProvidersConfig {
            osrm_url: env("SIGHTLINE_OSRM_URL")
                .or(fc.providers.osrm_url)
                .unwrap_or_else(|| DEFAULT_OSRM_URL.to_string()),
            overpass_url: env("SIGHTLINE_OVERPASS_URL")
                .or(fc.providers.overpass_url)
                .unwrap_or_else(|| DEFAULT_OVERPASS_URL.to_string()),
            transit_radius_m: parse_env(env, "SIGHTLINE_TRANSIT_RADIUS_M")?
                .or(fc.providers.transit_radius_m)
                .unwrap_or(DEFAULT_TRANSIT_RADIUS_M),
            request_timeout: Duration::from_secs(
                fc.providers
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        };

        let config = Self {
            guidance,
            detection,
            voice,
            providers,
        };
        config.validate()?;
        Ok(config)
    }

    /// Radii and cooldown for the navigation state machine
    #[must_use]
    pub const fn navigation_settings(&self) -> NavigationSettings {
        NavigationSettings {
            turn_radius_m: self.guidance.turn_radius_m,
            arrival_radius_m: self.guidance.arrival_radius_m,
            cooldown_ms: self.guidance.cooldown_ms,
        }
    }

    /// Check ranges that parsing alone cannot enforce
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending value
    pub fn validate(&self) -> Result<()> {
        if self.guidance.cooldown_ms == 0 {
            return Err(Error::Config("cooldown must be positive".to_string()));
        }
        for (name, radius) in [
            ("turn radius", self.guidance.turn_radius_m),
            ("arrival radius", self.guidance.arrival_radius_m),
            ("transit radius", self.providers.transit_radius_m),
        ] {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(Error::Config(format!("{name} must be positive, got {radius}")));
            }
        }
        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(Error::Config(format!(
                "min confidence must be within [0, 1], got {}",
                self.detection.min_confidence
            )));
        }
        if self.detection.interval_ms == 0 {
            return Err(Error::Config(
                "detection interval must be positive".to_string(),
            ));
        }
        if !self.voice.tts_speed.is_finite() || !(0.25..=4.0).contains(&self.voice.tts_speed) {
            return Err(Error::Config(format!(
                "TTS speed must be within [0.25, 4.0], got {}",
                self.voice.tts_speed
            )));
        }
        Ok(())
    }
}

/// Read and parse an environment variable, treating blank values as unset
fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env(key)
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("invalid {key}={v}: {e}")))
        })
        .transpose()
}
