//! End-to-end daemon tests
//!
//! In-memory position feed, scripted providers and a manual clock. Every
//! check goes through `flush`, which waits for queued events, pending
//! route lookups and running detection passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use sightline::clock::ManualClock;
use sightline::daemon::{
    LOCATION_UNAVAILABLE_PHRASE, NOT_UNDERSTOOD_PHRASE, ROUTE_UNAVAILABLE_PHRASE,
};
use sightline::detection::DetectionEvent;
use sightline::navigation::NAVIGATION_STOPPED_PHRASE;
use sightline::providers::{RouteProvider, StaticRouteProvider, StaticTransitFinder, TransitKind};
use sightline::route::{ARRIVAL_PHRASE, ManeuverKind, Route, Step};
use sightline::sources::{DetectionFeed, DetectionSource, PositionFeed};
use sightline::{
    Coordinate, Daemon, DaemonHandle, DaemonServices, DaemonSettings, Destination, Error,
    NavigationState, Result, SpeechArbiter,
};

mod common;

use common::{
    RecordingVoice, Rig, detection_phrase, north_of, origin, place, test_settings,
    three_step_route,
};

#[tokio::test]
async fn test_walk_to_train_station() {
    let o = origin();
    let rig = Rig::start(
        Some(three_step_route()),
        vec![(TransitKind::Train, place("Central", north_of(o, 500.0)))],
    );

    rig.feed.publish(o);
    rig.handle.command("Take me to the train station").unwrap();
    let snap = rig.handle.flush().await.unwrap();

    assert_eq!(snap.state, NavigationState::Navigating);
    assert_eq!(snap.step_index, Some(0));
    assert_eq!(
        rig.last_said().as_deref(),
        Some("Start by walking on Main St for 200 meters")
    );
    assert_eq!(rig.feed.subscriber_count(), 1);

    rig.clock.set(31_000);
    rig.feed.publish(north_of(o, 190.0));
    let snap = rig.handle.flush().await.unwrap();
    assert_eq!(snap.step_index, Some(1));
    assert_eq!(
        rig.last_said().as_deref(),
        Some("Turn left onto Oak Ave for 300 meters")
    );

    rig.clock.set(71_000);
    rig.feed.publish(north_of(o, 495.0));
    let snap = rig.handle.flush().await.unwrap();
    assert_eq!(snap.state, NavigationState::Arrived);
    assert_eq!(rig.last_said().as_deref(), Some(ARRIVAL_PHRASE));

    // Arrival releases the position subscription
    assert_eq!(rig.feed.subscriber_count(), 0);
    assert_eq!(rig.transcript().len(), 3);
}

#[tokio::test]
async fn test_stop_releases_subscription_and_silences_updates() {
    let o = origin();
    let rig = Rig::start(Some(three_step_route()), vec![]);

    rig.feed.publish(o);
    rig.handle
        .navigate(Destination::Coordinate(north_of(o, 500.0)))
        .unwrap();
    rig.handle.flush().await.unwrap();
    assert_eq!(rig.feed.subscriber_count(), 1);

    rig.handle.command("stop navigation").unwrap();
    let snap = rig.handle.flush().await.unwrap();
    assert_eq!(snap.state, NavigationState::Idle);
    assert_eq!(snap.step_index, None);
    assert_eq!(rig.feed.subscriber_count(), 0);
    assert_eq!(rig.last_said().as_deref(), Some(NAVIGATION_STOPPED_PHRASE));

    let said = rig.transcript().len();
    rig.clock.set(60_000);
    rig.handle.position(north_of(o, 195.0)).unwrap();
    rig.handle.flush().await.unwrap();
    assert_eq!(rig.transcript().len(), said);
}

#[tokio::test]
async fn test_stop_when_idle_says_nothing() {
    let rig = Rig::start(None, vec![]);

    rig.handle.stop().unwrap();
    let snap = rig.handle.flush().await.unwrap();

    assert_eq!(snap.state, NavigationState::Idle);
    assert!(rig.transcript().is_empty());
}

#[tokio::test]
async fn test_no_location_yet() {
    let rig = Rig::start(Some(three_step_route()), vec![]);

    rig.handle.command("navigate to the nearest bus stop").unwrap();
    let snap = rig.handle.flush().await.unwrap();

    assert_eq!(snap.state, NavigationState::Idle);
    assert_eq!(rig.last_said().as_deref(), Some(LOCATION_UNAVAILABLE_PHRASE));
}

#[tokio::test]
async fn test_out_of_range_fix_is_ignored() {
    let rig = Rig::start(Some(three_step_route()), vec![]);

    rig.handle
        .position(Coordinate {
            latitude: 95.0,
            longitude: 0.0,
        })
        .unwrap();
    rig.handle
        .navigate(Destination::Coordinate(north_of(origin(), 500.0)))
        .unwrap();
    let snap = rig.handle.flush().await.unwrap();

    assert_eq!(snap.state, NavigationState::Idle);
    assert_eq!(rig.last_said().as_deref(), Some(LOCATION_UNAVAILABLE_PHRASE));
}

#[tokio::test]
async fn test_default_location_is_used_before_first_fix() {
    let settings = DaemonSettings {
        default_location: Some(origin()),
        ..test_settings()
    };
    let rig = Rig::with_settings(Some(three_step_route()), vec![], settings);

    rig.handle
        .navigate(Destination::Coordinate(north_of(origin(), 500.0)))
        .unwrap();
    let snap = rig.handle.flush().await.unwrap();

    assert_eq!(snap.state, NavigationState::Navigating);
}

#[tokio::test]
async fn test_transit_not_found_is_spoken() {
    let rig = Rig::start(Some(three_step_route()), vec![]);

    rig.feed.publish(origin());
    rig.handle.command("go to the bus stop").unwrap();
    rig.handle.flush().await.unwrap();

    assert_eq!(
        rig.last_said().as_deref(),
        Some("Sorry, I couldn't find a bus stop nearby")
    );
}

#[tokio::test]
async fn test_route_unavailable_is_spoken() {
    let rig = Rig::start(None, vec![]);

    rig.feed.publish(origin());
    rig.handle
        .navigate(Destination::Coordinate(north_of(origin(), 500.0)))
        .unwrap();
    let snap = rig.handle.flush().await.unwrap();

    assert_eq!(snap.state, NavigationState::Idle);
    assert_eq!(rig.last_said().as_deref(), Some(ROUTE_UNAVAILABLE_PHRASE));
}

#[tokio::test]
async fn test_unknown_command() {
    let rig = Rig::start(None, vec![]);

    rig.handle.command("what time is it").unwrap();
    rig.handle.flush().await.unwrap();

    assert_eq!(rig.last_said().as_deref(), Some(NOT_UNDERSTOOD_PHRASE));
}

#[tokio::test]
async fn test_detection_cooldown_per_class() {
    let rig = Rig::start(None, vec![]);
    let person = || vec![DetectionEvent::new("person", 0.9)];

    rig.handle.detections(person()).unwrap();
    rig.handle.flush().await.unwrap();
    assert_eq!(rig.transcript(), vec![detection_phrase("person", 90)]);

    rig.clock.set(10_000);
    rig.handle.detections(person()).unwrap();
    rig.handle.flush().await.unwrap();
    assert_eq!(rig.transcript().len(), 1);

    // Other classes have their own window
    rig.handle
        .detections(vec![DetectionEvent::new("chair", 0.7)])
        .unwrap();
    rig.handle.flush().await.unwrap();
    assert_eq!(rig.transcript().len(), 2);
    assert!(rig.last_said().unwrap().starts_with("chair detected"));

    rig.clock.set(31_000);
    rig.handle.detections(person()).unwrap();
    rig.handle.flush().await.unwrap();
    assert_eq!(rig.transcript().len(), 3);
}

#[tokio::test]
async fn test_detection_filters() {
    let rig = Rig::start(None, vec![]);

    rig.handle
        .detections(vec![
            DetectionEvent::new("dog", 0.99),
            DetectionEvent::new("person", 0.3),
        ])
        .unwrap();
    rig.handle.flush().await.unwrap();

    assert!(rig.transcript().is_empty());
}

/// Routes whose first street is named after the requested destination
struct SlowRoutes {
    delay: Duration,
}

#[async_trait]
impl RouteProvider for SlowRoutes {
    async fn walking_route(&self, start: Coordinate, end: Coordinate) -> Result<Route> {
        tokio::time::sleep(self.delay).await;
        Route::new(
            vec![
                Step::new(ManeuverKind::Depart, 10.0, start)
                    .with_street(format!("{:.4} St", end.latitude)),
                Step::new(ManeuverKind::Arrive, 0.0, end),
            ],
            10.0,
            8.0,
        )
    }
}

#[tokio::test]
async fn test_new_request_supersedes_pending_route() {
    let feed = Arc::new(PositionFeed::new());
    let speech = Arc::new(SpeechArbiter::new(Arc::new(RecordingVoice::default())));

    let services = DaemonServices {
        positions: feed.clone(),
        routes: Arc::new(SlowRoutes {
            delay: Duration::from_millis(100),
        }),
        transit: Arc::new(StaticTransitFinder::new(vec![])),
        detections: None,
        speech: Arc::clone(&speech),
        clock: Arc::new(ManualClock::new(0)),
    };
    let (daemon, handle) = Daemon::new(test_settings(), services);
    let task = tokio::spawn(daemon.run());

    let o = origin();
    feed.publish(o);
    handle
        .navigate(Destination::Coordinate(Coordinate::new(41.0, -73.9857).unwrap()))
        .unwrap();
    handle
        .navigate(Destination::Coordinate(Coordinate::new(42.0, -73.9857).unwrap()))
        .unwrap();
    let snap = handle.flush().await.unwrap();

    assert_eq!(snap.state, NavigationState::Navigating);
    assert_eq!(
        speech.transcript().texts(),
        vec!["Start by walking on 42.0000 St"]
    );
    assert_eq!(feed.subscriber_count(), 1);

    handle.shutdown().unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(feed.subscriber_count(), 0);
}

#[tokio::test]
async fn test_handle_fails_after_shutdown() {
    let rig = Rig::start(None, vec![]);

    rig.handle.shutdown().unwrap();
    rig.task.await.unwrap().unwrap();

    assert!(matches!(rig.handle.stop(), Err(Error::DaemonStopped)));
}

/// Daemon polling `source` every `interval`, with no route or transit data
fn polling_daemon(
    source: Arc<dyn DetectionSource>,
    interval: Duration,
) -> (
    DaemonHandle,
    Arc<SpeechArbiter>,
    tokio::task::JoinHandle<Result<()>>,
) {
    let speech = Arc::new(SpeechArbiter::new(Arc::new(RecordingVoice::default())));
    let services = DaemonServices {
        positions: Arc::new(PositionFeed::new()),
        routes: Arc::new(StaticRouteProvider::unavailable()),
        transit: Arc::new(StaticTransitFinder::new(vec![])),
        detections: Some(source),
        speech: Arc::clone(&speech),
        clock: Arc::new(ManualClock::new(0)),
    };
    let settings = DaemonSettings {
        detection_interval: interval,
        ..test_settings()
    };

    let (daemon, handle) = Daemon::new(settings, services);
    let task = tokio::spawn(daemon.run());
    (handle, speech, task)
}

#[tokio::test]
async fn test_detection_poll_announces_queued_frame() {
    let feed = Arc::new(DetectionFeed::new());
    feed.push(vec![DetectionEvent::new("person", 0.9)]);

    let (handle, speech, task) = polling_daemon(feed, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.flush().await.unwrap();

    assert_eq!(speech.transcript().texts(), vec![detection_phrase("person", 90)]);

    handle.shutdown().unwrap();
    task.await.unwrap().unwrap();
}

/// Detection pass that takes `delay` and counts how often it was started
struct SlowDetections {
    delay: Duration,
    calls: AtomicUsize,
}

#[async_trait]
impl DetectionSource for SlowDetections {
    async fn detect(&self) -> Result<Vec<DetectionEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(vec![DetectionEvent::new("chair", 0.8)])
    }
}

#[tokio::test]
async fn test_detection_tick_skipped_while_pass_running() {
    let source = Arc::new(SlowDetections {
        delay: Duration::from_millis(300),
        calls: AtomicUsize::new(0),
    });

    let (handle, speech, task) = polling_daemon(source.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Several ticks have passed, but the first pass is still running
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    handle.flush().await.unwrap();
    assert_eq!(speech.transcript().texts(), vec![detection_phrase("chair", 80)]);

    handle.shutdown().unwrap();
    task.await.unwrap().unwrap();
}

/// Fails its first pass, then reports a person
struct FlakyDetections {
    calls: AtomicUsize,
}

#[async_trait]
impl DetectionSource for FlakyDetections {
    async fn detect(&self) -> Result<Vec<DetectionEvent>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(Error::Io(std::io::Error::other("camera unavailable")));
        }
        Ok(vec![DetectionEvent::new("person", 0.9)])
    }
}

#[tokio::test]
async fn test_detection_failure_keeps_polling() {
    let source = Arc::new(FlakyDetections {
        calls: AtomicUsize::new(0),
    });

    let (handle, speech, task) = polling_daemon(source.clone(), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.flush().await.unwrap();

    assert!(source.calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(speech.transcript().texts(), vec![detection_phrase("person", 90)]);

    handle.shutdown().unwrap();
    task.await.unwrap().unwrap();
}
