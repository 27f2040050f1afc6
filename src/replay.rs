//! Scripted walks
//!
//! A scenario is a JSON-lines file. Setup lines (`route`, `place`) describe the
//! world; timed lines drive a daemon on a manual clock. What the daemon says
//! is collected with the scenario time it was said at.
//!
//! ```text
//! {"type": "route", "route": {"steps": [...]}}
//! {"type": "place", "kind": "train", "name": "Central", "location": {"latitude": 40.75, "longitude": -73.98}}
//! {"at_ms": 0, "type": "position", "location": {"latitude": 40.7484, "longitude": -73.9857}}
//! {"at_ms": 0, "type": "command", "text": "take me to the train station"}
//! {"at_ms": 31000, "type": "detections", "events": [{"class": "person", "confidence": 0.9}]}
//! {"at_ms": 40000, "type": "stop"}
//! ```

use std::sync::Arc;

use serde::Deserialize;

use crate::clock::ManualClock;
use crate::daemon::{Daemon, DaemonServices, DaemonSettings, Destination};
use crate::detection::DetectionEvent;
use crate::geo::Coordinate;
use crate::providers::{Place, StaticRouteProvider, StaticTransitFinder, TransitKind};
use crate::route::Route;
use crate::sources::PositionFeed;
use crate::speech::{SpeechArbiter, SpeechOutput};
use crate::{Error, Result};

#[derive(Deserialize)]
struct Line {
    #[serde(default)]
    at_ms: u64,
    #[serde(flatten)]
    entry: Entry,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Entry {
    Route {
        route: Route,
    },
    Place {
        kind: TransitKind,
        name: String,
        location: Coordinate,
    },
    Position {
        location: Coordinate,
    },
    Navigate {
        #[serde(default)]
        to: Option<Coordinate>,
        #[serde(default)]
        transit: Option<TransitKind>,
    },
    Detections {
        events: Vec<DetectionEvent>,
    },
    Command {
        text: String,
    },
    Stop,
}

/// One scripted input
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Publish a fix on the position feed
    Position(Coordinate),
    Navigate(Destination),
    Detections(Vec<DetectionEvent>),
    Command(String),
    Stop,
}

/// An action and the scenario time it happens at
#[derive(Debug, Clone, PartialEq)]
pub struct TimedAction {
    pub at_ms: u64,
    pub action: Action,
}

/// Something the daemon said during a replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenLine {
    pub at_ms: u64,
    pub text: String,
}

/// A parsed scenario file
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    route: Option<Route>,
    places: Vec<(TransitKind, Place)>,
    actions: Vec<TimedAction>,
}

impl Scenario {
    /// Parse JSON-lines scenario text
    ///
    /// Blank lines and lines starting with `#` are skipped. Timed lines must
    /// not go back in time.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidScenario` naming the first bad line
    pub fn parse(text: &str) -> Result<Self> {
        let mut scenario = Self::default();
        let mut last_at = 0;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let raw = raw.trim();
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }

            let invalid = |reason: String| Error::InvalidScenario {
                line: line_no,
                reason,
            };

            let line: Line = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;

            let action = match line.entry {
                Entry::Route { route } => {
                    scenario.route = Some(route);
                    continue;
                }
                Entry::Place {
                    kind,
                    name,
                    location,
                } => {
                    scenario.places.push((kind, Place { name, location }));
                    continue;
                }
                Entry::Position { location } => Action::Position(location),
                Entry::Navigate { to, transit } => match (to, transit) {
                    (Some(point), None) => Action::Navigate(Destination::Coordinate(point)),
                    (None, Some(kind)) => Action::Navigate(Destination::Transit(kind)),
                    _ => {
                        return Err(invalid(
                            "navigate needs exactly one of `to` or `transit`".to_string(),
                        ));
                    }
                },
                Entry::Detections { events } => Action::Detections(
                    events
                        .into_iter()
                        .map(|e| DetectionEvent::new(e.class, e.confidence))
                        .collect(),
                ),
                Entry::Command { text } => Action::Command(text),
                Entry::Stop => Action::Stop,
            };

            if line.at_ms < last_at {
                return Err(invalid(format!(
                    "at_ms {} is earlier than the previous line ({last_at})",
                    line.at_ms
                )));
            }
            last_at = line.at_ms;

            scenario.actions.push(TimedAction {
                at_ms: line.at_ms,
                action,
            });
        }

        Ok(scenario)
    }

    /// Timed actions in order
    #[must_use]
    pub fn actions(&self) -> &[TimedAction] {
        &self.actions
    }

    /// Scripted route, if any
    #[must_use]
    pub const fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Drive a fresh daemon through the scenario
    ///
    /// Each action is applied at its time and allowed to settle before the
    /// next one.
    ///
    /// # Errors
    ///
    /// Returns error if the daemon stops unexpectedly
    pub async fn run(
        self,
        settings: DaemonSettings,
        voice: Arc<dyn SpeechOutput>,
    ) -> Result<Vec<SpokenLine>> {
        let clock = Arc::new(ManualClock::new(0));
        let feed = Arc::new(PositionFeed::new());
        let speech = Arc::new(SpeechArbiter::new(voice));

        let routes = self
            .route
            .map_or_else(StaticRouteProvider::unavailable, StaticRouteProvider::new);

        let services = DaemonServices {
            positions: feed.clone(),
            routes: Arc::new(routes),
            transit: Arc::new(StaticTransitFinder::new(self.places)),
            detections: None,
            speech: Arc::clone(&speech),
            clock: clock.clone(),
        };

        let (daemon, handle) = Daemon::new(settings, services);
        let task = tokio::spawn(daemon.run());

        let mut spoken = Vec::new();
        let mut seen = 0;

        for TimedAction { at_ms, action } in self.actions {
            clock.set(at_ms);
            tracing::debug!(at_ms, ?action, "replaying");

            match action {
                Action::Position(fix) => feed.publish(fix),
                Action::Navigate(destination) => handle.navigate(destination)?,
                Action::Detections(events) => handle.detections(events)?,
                Action::Command(text) => handle.command(text)?,
                Action::Stop => handle.stop()?,
            }
            handle.flush().await?;

            for entry in speech.transcript().after(seen) {
                seen = entry.id;
                spoken.push(SpokenLine {
                    at_ms,
                    text: entry.text,
                });
            }
        }

        handle.shutdown()?;
        match task.await {
            Ok(result) => result?,
            Err(e) => tracing::error!(error = %e, "daemon task failed"),
        }
        speech.finish().await;

        Ok(spoken)
    }
}
