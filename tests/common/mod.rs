//! Shared test utilities
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use sightline::clock::ManualClock;
use sightline::detection::DEFAULT_DETECTION_PHRASES;
use sightline::geo::EARTH_RADIUS_M;
use sightline::phrasing::{PhrasePool, SeededRandom};
use sightline::providers::{Place, StaticRouteProvider, StaticTransitFinder, TransitKind};
use sightline::route::{ManeuverKind, Route, Step};
use sightline::sources::PositionFeed;
use sightline::{
    Coordinate, Daemon, DaemonHandle, DaemonServices, DaemonSettings, Error, Result,
    SpeechArbiter, SpeechOutput,
};

/// Empire State Building, a convenient walking origin
pub fn origin() -> Coordinate {
    Coordinate::new(40.7484, -73.9857).expect("valid origin")
}

/// Point `meters` due north of `from`
pub fn north_of(from: Coordinate, meters: f64) -> Coordinate {
    let dlat = (meters / EARTH_RADIUS_M).to_degrees();
    Coordinate::new(from.latitude + dlat, from.longitude).expect("valid coordinate")
}

/// Depart on Main St, turn left onto Oak Ave after 200 m, arrive 300 m later
pub fn three_step_route() -> Route {
    let o = origin();
    Route::new(
        vec![
            Step::new(ManeuverKind::Depart, 200.0, o).with_street("Main St"),
            Step::new(ManeuverKind::Turn, 300.0, north_of(o, 200.0))
                .with_modifier("left")
                .with_street("Oak Ave"),
            Step::new(ManeuverKind::Arrive, 0.0, north_of(o, 500.0)),
        ],
        500.0,
        400.0,
    )
    .expect("valid route")
}

/// Voice that records what it was asked to say
#[derive(Default)]
pub struct RecordingVoice {
    pub spoken: Arc<Mutex<Vec<String>>>,
    pub cancels: AtomicUsize,
    /// How long each utterance takes
    pub duration: Option<Duration>,
    pub fail: bool,
}

impl RecordingVoice {
    pub fn slow(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn spoken(&self) -> Vec<String> {
        self.spoken.lock().await.clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechOutput for RecordingVoice {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn speak(&self, text: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Speech("engine offline".to_string()));
        }
        if let Some(duration) = self.duration {
            tokio::time::sleep(duration).await;
        }
        self.spoken.lock().await.push(text.to_string());
        Ok(())
    }

    async fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        // Real engines await their own shutdown
        tokio::task::yield_now().await;
    }
}

/// A daemon wired to in-memory collaborators
pub struct Rig {
    pub handle: DaemonHandle,
    pub feed: Arc<PositionFeed>,
    pub clock: Arc<ManualClock>,
    pub speech: Arc<SpeechArbiter>,
    pub task: tokio::task::JoinHandle<Result<()>>,
}

impl Rig {
    /// Daemon with a scripted route and transit stops
    pub fn start(route: Option<Route>, places: Vec<(TransitKind, Place)>) -> Self {
        Self::with_settings(route, places, test_settings())
    }

    pub fn with_settings(
        route: Option<Route>,
        places: Vec<(TransitKind, Place)>,
        settings: DaemonSettings,
    ) -> Self {
        let feed = Arc::new(PositionFeed::new());
        let clock = Arc::new(ManualClock::new(0));
        let speech = Arc::new(SpeechArbiter::new(Arc::new(RecordingVoice::default())));

        let routes = route.map_or_else(StaticRouteProvider::unavailable, StaticRouteProvider::new);

        let services = DaemonServices {
            positions: feed.clone(),
            routes: Arc::new(routes),
            transit: Arc::new(StaticTransitFinder::new(places)),
            detections: None,
            speech: Arc::clone(&speech),
            clock: clock.clone(),
        };

        let (daemon, handle) = Daemon::new(settings, services);
        let task = tokio::spawn(daemon.run());

        Self {
            handle,
            feed,
            clock,
            speech,
            task,
        }
    }

    /// Everything said so far
    pub fn transcript(&self) -> Vec<String> {
        self.speech.transcript().texts()
    }

    /// Last thing said
    pub fn last_said(&self) -> Option<String> {
        self.speech.transcript().last().map(|e| e.text)
    }
}

/// Phrase seed used by [`test_settings`]
pub const PHRASE_SEED: u64 = 7;

/// Default settings with deterministic phrase selection
pub fn test_settings() -> DaemonSettings {
    DaemonSettings {
        phrase_seed: Some(PHRASE_SEED),
        ..DaemonSettings::default()
    }
}

pub fn place(name: &str, location: Coordinate) -> Place {
    Place {
        name: name.to_string(),
        location,
    }
}

/// First detection announcement a daemon on [`test_settings`] makes
pub fn detection_phrase(class: &str, percent: u8) -> String {
    let mut pool = PhrasePool::new(
        DEFAULT_DETECTION_PHRASES.iter().copied(),
        SeededRandom::new(PHRASE_SEED),
    );
    pool.render(&[("class", class), ("confidence", &percent.to_string())])
}
