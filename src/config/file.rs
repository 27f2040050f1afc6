//! TOML configuration file loading
//!
//! Supports `~/.config/sightline/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SightlineConfigFile {
    /// Navigation radii, cooldown and fallback location
    #[serde(default)]
    pub guidance: GuidanceFileConfig,

    /// Object announcement settings
    #[serde(default)]
    pub detection: DetectionFileConfig,

    /// Voice engine selection
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Routing and transit lookup endpoints
    #[serde(default)]
    pub providers: ProvidersFileConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct GuidanceFileConfig {
    /// Shared announcement cooldown in milliseconds
    pub cooldown_ms: Option<u64>,

    pub turn_radius_m: Option<f64>,

    pub arrival_radius_m: Option<f64>,

    /// Used as the routing origin before the first fix, as `"lat,lon"`
    pub default_location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetectionFileConfig {
    /// Allow-listed class labels (e.g. `["person", "chair"]`)
    pub classes: Option<Vec<String>>,

    pub min_confidence: Option<f32>,

    /// Detection polling period in milliseconds
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// TTS provider ("openai" or "elevenlabs"); console output when unset
    pub provider: Option<String>,

    /// "female" or "male"
    pub voice_type: Option<String>,

    /// Provider voice override
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProvidersFileConfig {
    pub osrm_url: Option<String>,

    pub overpass_url: Option<String>,

    /// Transit search radius in meters
    pub transit_radius_m: Option<f64>,

    /// HTTP timeout for routing and lookup requests
    pub request_timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SightlineConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
#[must_use]
pub fn load_config_file() -> SightlineConfigFile {
    config_file_path().map_or_else(SightlineConfigFile::default, |path| {
        load_config_file_from(&path)
    })
}

/// Load a TOML config file from `path`, falling back to defaults
#[must_use]
pub fn load_config_file_from(path: &Path) -> SightlineConfigFile {
    if !path.exists() {
        return SightlineConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                SightlineConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SightlineConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/sightline/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("sightline").join("config.toml"))
}
