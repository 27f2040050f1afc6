//! Sightline - spoken walking guidance and object announcements
//!
//! This library provides the core of a hands-free navigation assistant:
//! - Turn-by-turn guidance along a walking route, driven by position fixes
//! - Throttled announcements of recognized objects
//! - A single voice channel where the newest utterance wins
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Inputs                         │
//! │   Position feed  │  Detection feed  │  Commands     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ events
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Daemon                          │
//! │   Navigation state machine  │  Detection announcer  │
//! │            shared AnnouncementThrottle              │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │ routes / stops              │ phrases
//! ┌──────────▼──────────┐       ┌──────────▼────────────┐
//! │  OSRM  │  Overpass  │       │    SpeechArbiter      │
//! └─────────────────────┘       │  TTS / console voice  │
//!                               └───────────────────────┘
//! ```

pub mod clock;
pub mod command;
pub mod config;
pub mod daemon;
pub mod detection;
pub mod error;
pub mod geo;
pub mod navigation;
pub mod phrasing;
pub mod providers;
pub mod replay;
pub mod route;
pub mod sources;
pub mod speech;
pub mod throttle;
pub mod voice;

pub use config::Config;
pub use daemon::{Daemon, DaemonHandle, DaemonServices, DaemonSettings, Destination, Snapshot};
pub use error::{Error, Result};
pub use geo::{Coordinate, distance_meters};
pub use navigation::{NavigationState, NavigationStateMachine};
pub use speech::{SpeechArbiter, SpeechOutput};
pub use throttle::AnnouncementThrottle;
