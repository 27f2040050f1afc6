//! Daemon - the guidance service loop
//!
//! Owns the navigation state machine and the detection announcer. Everything
//! else reaches it through a [`DaemonHandle`]: position fixes, detection
//! frames and commands are queued and handled one at a time, in order. Route
//! construction and detection passes run as background tasks whose results
//! come back to the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::command::{self, Command};
use crate::config::{Config, DEFAULT_DETECTION_INTERVAL_MS, DEFAULT_TRANSIT_RADIUS_M};
use crate::detection::{
    DEFAULT_DETECTION_CLASSES, DEFAULT_DETECTION_PHRASES, DEFAULT_MIN_CONFIDENCE,
    DetectionAnnouncer, DetectionEvent,
};
use crate::geo::Coordinate;
use crate::navigation::{NavigationSettings, NavigationState, NavigationStateMachine};
use crate::phrasing::{PhrasePool, SeededRandom};
use crate::providers::{RouteProvider, TransitFinder, TransitKind};
use crate::route::{Route, StepFormatter};
use crate::sources::{DetectionSource, PositionSink, PositionSource, SubscriptionId};
use crate::speech::SpeechArbiter;
use crate::throttle::AnnouncementThrottle;
use crate::{Error, Result};

/// Spoken when routing is requested before any location is known
pub const LOCATION_UNAVAILABLE_PHRASE: &str = "I can't find your location yet";

/// Spoken when no walking route could be built
pub const ROUTE_UNAVAILABLE_PHRASE: &str = "Sorry, I couldn't find a walking route there";

/// Spoken for an utterance that is not a known command
pub const NOT_UNDERSTOOD_PHRASE: &str = "Sorry, I didn't catch that";

/// Where the user wants to go
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Destination {
    /// An explicit point
    Coordinate(Coordinate),
    /// The nearest stop of a kind
    Transit(TransitKind),
}

/// Inbound daemon events
#[derive(Debug)]
pub enum Event {
    /// Position fix from the subscribed source
    Position(Coordinate),
    /// One detection frame
    Detections(Vec<DetectionEvent>),
    /// Start navigating; supersedes any pending route request
    Navigate(Destination),
    /// Transcribed voice command
    Command(String),
    /// Cancel navigation
    Stop,
    /// Wait for background work to settle, then report state
    Flush(oneshot::Sender<Snapshot>),
    /// Leave the loop
    Shutdown,
}

/// Daemon state as seen by [`DaemonHandle::flush`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub state: NavigationState,
    pub step_index: Option<usize>,
    pub speaking: bool,
}

/// Tuning for the daemon
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonSettings {
    pub navigation: NavigationSettings,
    pub detection_classes: Vec<String>,
    pub min_confidence: f32,
    /// Period of the detection poll
    pub detection_interval: Duration,
    pub transit_radius_m: f64,
    /// Routing origin before the first fix
    pub default_location: Option<Coordinate>,
    /// Seed for detection phrase selection; random when unset
    pub phrase_seed: Option<u64>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            navigation: NavigationSettings::default(),
            detection_classes: DEFAULT_DETECTION_CLASSES
                .iter()
                .map(ToString::to_string)
                .collect(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            detection_interval: Duration::from_millis(DEFAULT_DETECTION_INTERVAL_MS),
            transit_radius_m: DEFAULT_TRANSIT_RADIUS_M,
            default_location: None,
            phrase_seed: None,
        }
    }
}

impl DaemonSettings {
    /// Derive daemon settings from loaded configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            navigation: config.navigation_settings(),
            detection_classes: config.detection.classes.clone(),
            min_confidence: config.detection.min_confidence,
            detection_interval: Duration::from_millis(config.detection.interval_ms),
            transit_radius_m: config.providers.transit_radius_m,
            default_location: config.guidance.default_location,
            phrase_seed: None,
        }
    }
}

/// External collaborators
pub struct DaemonServices {
    pub positions: Arc<dyn PositionSource>,
    pub routes: Arc<dyn RouteProvider>,
    pub transit: Arc<dyn TransitFinder>,
    /// Polled on the detection interval when present
    pub detections: Option<Arc<dyn DetectionSource>>,
    pub speech: Arc<SpeechArbiter>,
    pub clock: Arc<dyn Clock>,
}

/// Cloneable sender into the daemon queue
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl DaemonHandle {
    /// Queue a raw event
    ///
    /// # Errors
    ///
    /// Returns `Error::DaemonStopped` if the loop has exited
    pub fn send(&self, event: Event) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::DaemonStopped)
    }

    /// Navigate to `destination`
    ///
    /// # Errors
    ///
    /// Returns `Error::DaemonStopped` if the loop has exited
    pub fn navigate(&self, destination: Destination) -> Result<()> {
        self.send(Event::Navigate(destination))
    }

    /// Handle a transcribed voice command
    ///
    /// # Errors
    ///
    /// Returns `Error::DaemonStopped` if the loop has exited
    pub fn command(&self, text: impl Into<String>) -> Result<()> {
        self.send(Event::Command(text.into()))
    }

    /// Cancel navigation
    ///
    /// # Errors
    ///
    /// Returns `Error::DaemonStopped` if the loop has exited
    pub fn stop(&self) -> Result<()> {
        self.send(Event::Stop)
    }

    /// Deliver a fix directly, bypassing the position source
    ///
    /// # Errors
    ///
    /// Returns `Error::DaemonStopped` if the loop has exited
    pub fn position(&self, fix: Coordinate) -> Result<()> {
        self.send(Event::Position(fix))
    }

    /// Deliver one detection frame
    ///
    /// # Errors
    ///
    /// Returns `Error::DaemonStopped` if the loop has exited
    pub fn detections(&self, events: Vec<DetectionEvent>) -> Result<()> {
        self.send(Event::Detections(events))
    }

    /// Wait until everything queued so far has been handled
    ///
    /// Pending route construction and detection passes are awaited too.
    ///
    /// # Errors
    ///
    /// Returns `Error::DaemonStopped` if the loop has exited
    pub async fn flush(&self) -> Result<Snapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Flush(tx))?;
        rx.await.map_err(|_| Error::DaemonStopped)
    }

    /// Ask the loop to exit
    ///
    /// # Errors
    ///
    /// Returns `Error::DaemonStopped` if the loop has already exited
    pub fn shutdown(&self) -> Result<()> {
        self.send(Event::Shutdown)
    }
}

struct RouteTask {
    request: u64,
    handle: JoinHandle<Result<Route>>,
}

type DetectionTask = JoinHandle<Result<Vec<DetectionEvent>>>;

/// Background work owned by the loop
#[derive(Default)]
struct Inflight {
    route: Option<RouteTask>,
    detection: Option<DetectionTask>,
}

/// The guidance daemon
pub struct Daemon {
    settings: DaemonSettings,
    services: DaemonServices,
    navigation: NavigationStateMachine,
    announcer: DetectionAnnouncer,
    rx: mpsc::UnboundedReceiver<Event>,
    /// Weak so the loop ends once every handle is dropped
    events: mpsc::WeakUnboundedSender<Event>,
    last_position: Option<Coordinate>,
    next_request: u64,
}

impl Daemon {
    /// Create a daemon and the handle used to drive it
    #[must_use]
    pub fn new(settings: DaemonSettings, services: DaemonServices) -> (Self, DaemonHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let throttle = AnnouncementThrottle::new(settings.navigation.cooldown_ms);
        let navigation = NavigationStateMachine::new(
            settings.navigation,
            StepFormatter::default(),
            throttle.clone(),
        );

        let classes = settings.detection_classes.iter().map(String::as_str);
        let announcer = match settings.phrase_seed {
            Some(seed) => DetectionAnnouncer::with_phrases(
                classes,
                settings.min_confidence,
                throttle,
                PhrasePool::new(
                    DEFAULT_DETECTION_PHRASES.iter().copied(),
                    SeededRandom::new(seed),
                ),
            ),
            None => DetectionAnnouncer::new(classes, settings.min_confidence, throttle),
        };

        let daemon = Self {
            settings,
            services,
            navigation,
            announcer,
            rx,
            events: tx.downgrade(),
            last_position: None,
            next_request: 0,
        };

        (daemon, DaemonHandle { tx })
    }

    /// Run until shutdown is requested or every handle is dropped
    ///
    /// # Errors
    ///
    /// Currently never fails; failures inside the loop are spoken or logged
    pub async fn run(mut self) -> Result<()> {
        let polling = self.services.detections.is_some();
        tracing::info!(
            detection = polling,
            interval = ?self.settings.detection_interval,
            "daemon running"
        );

        let mut ticker = tokio::time::interval(self.settings.detection_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut inflight = Inflight::default();

        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    None | Some(Event::Shutdown) => break,
                    Some(event) => self.handle_event(event, &mut inflight).await,
                },
                _ = ticker.tick(), if polling => self.poll_detections(&mut inflight),
                (request, joined) = wait_route(&mut inflight.route) => {
                    inflight.route = None;
                    self.finish_route(request, joined).await;
                }
                joined = wait_detection(&mut inflight.detection) => {
                    inflight.detection = None;
                    self.finish_detection(joined).await;
                }
            }
        }

        self.shutdown(&mut inflight);
        Ok(())
    }

    async fn handle_event(&mut self, event: Event, inflight: &mut Inflight) {
        match event {
            Event::Position(fix) => self.on_position(fix).await,
            Event::Detections(events) => self.on_detections(&events).await,
            Event::Navigate(destination) => self.navigate(destination, inflight).await,
            Event::Command(text) => self.on_command(&text, inflight).await,
            Event::Stop => self.stop(inflight).await,
            Event::Flush(reply) => {
                self.settle(inflight).await;
                // Caller may have given up waiting
                let _ = reply.send(self.snapshot());
            }
            Event::Shutdown => {}
        }
    }

    async fn on_position(&mut self, fix: Coordinate) {
        if let Err(e) = fix.validate() {
            tracing::warn!(error = %e, "ignoring position fix");
            return;
        }
        self.last_position = Some(fix);

        let now = self.services.clock.now_ms();
        let outcome = self.navigation.on_position_update(fix, now);

        if let Some(id) = outcome.release {
            self.release(id);
        }
        if let Some(text) = outcome.announcement {
            self.services.speech.speak(&text).await;
        }
    }

    async fn on_detections(&mut self, events: &[DetectionEvent]) {
        let now = self.services.clock.now_ms();
        for phrase in self.announcer.process(events, now) {
            self.services.speech.speak(&phrase).await;
        }
    }

    async fn on_command(&mut self, text: &str, inflight: &mut Inflight) {
        match command::parse(text) {
            Some(Command::Navigate(kind)) => {
                self.navigate(Destination::Transit(kind), inflight).await;
            }
            Some(Command::Stop) => self.stop(inflight).await,
            None => {
                tracing::info!(text, "unrecognized command");
                self.services.speech.speak(NOT_UNDERSTOOD_PHRASE).await;
            }
        }
    }

    async fn navigate(&mut self, destination: Destination, inflight: &mut Inflight) {
        if let Some(previous) = inflight.route.take() {
            previous.handle.abort();
            tracing::info!(request = previous.request, "route request superseded");
        }

        let Some(origin) = self.origin() else {
            tracing::warn!(error = %Error::LocationUnavailable, "cannot build route");
            self.services.speech.speak(LOCATION_UNAVAILABLE_PHRASE).await;
            return;
        };

        self.next_request += 1;
        let request = self.next_request;
        let routes = Arc::clone(&self.services.routes);
        let transit = Arc::clone(&self.services.transit);
        let radius_m = self.settings.transit_radius_m;

        tracing::info!(request, ?destination, %origin, "requesting route");

        let handle = tokio::spawn(async move {
            let target = match destination {
                Destination::Coordinate(point) => point,
                Destination::Transit(kind) => {
                    let place = transit.find_nearest(kind, origin, radius_m).await?;
                    tracing::info!(%kind, name = %place.name, location = %place.location, "nearest stop found");
                    place.location
                }
            };
            routes.walking_route(origin, target).await
        });

        inflight.route = Some(RouteTask { request, handle });
    }

    async fn finish_route(
        &mut self,
        request: u64,
        joined: std::result::Result<Result<Route>, JoinError>,
    ) {
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => return,
            Err(e) => {
                tracing::error!(request, error = %e, "route task failed");
                Err(Error::RouteUnavailable(e.to_string()))
            }
        };

        match result {
            Ok(route) => self.begin(route).await,
            Err(e) => {
                tracing::warn!(request, error = %e, "route construction failed");
                self.services.speech.speak(&failure_phrase(&e)).await;
            }
        }
    }

    /// Start a session and subscribe to position updates for it
    async fn begin(&mut self, route: Route) {
        let now = self.services.clock.now_ms();
        let outcome = self.navigation.start(route, now);

        if let Some(id) = outcome.release {
            self.release(id);
        }

        let id = self.services.positions.subscribe(self.position_sink());
        if let Some(orphan) = self.navigation.attach_subscription(id) {
            self.release(orphan);
        }

        self.services.speech.speak(&outcome.announcement).await;
    }

    async fn stop(&mut self, inflight: &mut Inflight) {
        if let Some(task) = inflight.route.take() {
            task.handle.abort();
            tracing::info!(request = task.request, "route request cancelled");
        }

        let outcome = self.navigation.stop();
        if let Some(id) = outcome.release {
            self.release(id);
        }
        if let Some(text) = outcome.announcement {
            self.services.speech.speak(&text).await;
        }
    }

    fn poll_detections(&self, inflight: &mut Inflight) {
        let Some(source) = &self.services.detections else {
            return;
        };

        if inflight.detection.is_some() {
            tracing::debug!("detection pass still running, skipping tick");
            return;
        }

        let source = Arc::clone(source);
        inflight.detection = Some(tokio::spawn(async move { source.detect().await }));
    }

    async fn finish_detection(
        &mut self,
        joined: std::result::Result<Result<Vec<DetectionEvent>>, JoinError>,
    ) {
        match joined {
            Ok(Ok(events)) => self.on_detections(&events).await,
            Ok(Err(e)) => tracing::warn!(error = %e, "detection pass failed"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::error!(error = %e, "detection task failed"),
        }
    }

    /// Await outstanding background work and apply its results
    async fn settle(&mut self, inflight: &mut Inflight) {
        if let Some(task) = inflight.route.take() {
            let joined = task.handle.await;
            self.finish_route(task.request, joined).await;
        }
        if let Some(handle) = inflight.detection.take() {
            let joined = handle.await;
            self.finish_detection(joined).await;
        }
    }

    fn shutdown(&mut self, inflight: &mut Inflight) {
        if let Some(task) = inflight.route.take() {
            task.handle.abort();
        }
        if let Some(handle) = inflight.detection.take() {
            handle.abort();
        }

        if let Some(id) = self.navigation.stop().release {
            self.release(id);
        }
        tracing::info!("daemon stopped");
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.navigation.state(),
            step_index: self.navigation.current_step_index(),
            speaking: self.services.speech.is_speaking(),
        }
    }

    fn origin(&self) -> Option<Coordinate> {
        self.services
            .positions
            .last_fix()
            .or(self.last_position)
            .or_else(|| {
                let fallback = self.settings.default_location;
                if fallback.is_some() {
                    tracing::info!(error = %Error::LocationUnavailable, "no fix yet, using default location");
                }
                fallback
            })
    }

    fn position_sink(&self) -> PositionSink {
        let events = self.events.clone();
        Arc::new(move |fix| {
            if let Some(tx) = events.upgrade() {
                // Closed queue means the daemon is shutting down
                let _ = tx.send(Event::Position(fix));
            }
        })
    }

    fn release(&self, id: SubscriptionId) {
        self.services.positions.unsubscribe(id);
    }
}

/// What the user hears when a route request fails
fn failure_phrase(error: &Error) -> String {
    match error {
        Error::TransitNotFound { kind, .. } => format!("Sorry, I couldn't find a {kind} nearby"),
        Error::LocationUnavailable => LOCATION_UNAVAILABLE_PHRASE.to_string(),
        _ => ROUTE_UNAVAILABLE_PHRASE.to_string(),
    }
}

async fn wait_route(
    task: &mut Option<RouteTask>,
) -> (u64, std::result::Result<Result<Route>, JoinError>) {
    match task {
        Some(task) => (task.request, (&mut task.handle).await),
        None => std::future::pending().await,
    }
}

async fn wait_detection(
    task: &mut Option<DetectionTask>,
) -> std::result::Result<Result<Vec<DetectionEvent>>, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
