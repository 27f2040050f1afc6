//! Walking-guidance scenarios against the state machine
//!
//! Timestamps are passed explicitly; no runtime needed.

use sightline::navigation::{NAVIGATION_STOPPED_PHRASE, NavigationSettings, PositionOutcome};
use sightline::route::{ARRIVAL_PHRASE, StepFormatter};
use sightline::throttle::{AnnouncementThrottle, NAVIGATION_KEY};
use sightline::{NavigationState, NavigationStateMachine};

mod common;

use common::{north_of, origin, three_step_route};

fn machine(throttle: AnnouncementThrottle) -> NavigationStateMachine {
    NavigationStateMachine::new(NavigationSettings::default(), StepFormatter::default(), throttle)
}

#[test]
fn test_three_step_walk() {
    let throttle = AnnouncementThrottle::default();
    let mut nav = machine(throttle.clone());

    let start = nav.start(three_step_route(), 0);
    assert_eq!(start.announcement, "Start by walking on Main St for 200 meters");
    assert_eq!(throttle.last_announced(NAVIGATION_KEY), Some(0));

    // 10 m from the turn, 31 s after the start announcement
    let turn = nav.on_position_update(north_of(origin(), 190.0), 31_000);
    assert_eq!(turn.advanced_to, Some(1));
    assert_eq!(
        turn.announcement.as_deref(),
        Some("Turn left onto Oak Ave for 300 meters")
    );
    assert!(!turn.arrived);

    // 5 m from the destination, 40 s later
    let arrive = nav.on_position_update(north_of(origin(), 495.0), 71_000);
    assert_eq!(arrive.advanced_to, Some(2));
    assert!(arrive.arrived);
    assert_eq!(arrive.announcement.as_deref(), Some(ARRIVAL_PHRASE));
    assert_eq!(nav.state(), NavigationState::Arrived);
    assert_eq!(nav.current_step_index(), Some(2));

    // Terminal until a new start
    let after = nav.on_position_update(north_of(origin(), 500.0), 200_000);
    assert_eq!(after, PositionOutcome::default());
}

#[test]
fn test_cooldown_holds_back_advance() {
    let mut nav = machine(AnnouncementThrottle::default());
    nav.start(three_step_route(), 0);

    let near_turn = north_of(origin(), 195.0);
    for now in [1_000, 10_000, 30_000] {
        assert_eq!(nav.on_position_update(near_turn, now).announcement, None);
    }
    assert_eq!(nav.current_step_index(), Some(0));

    let out = nav.on_position_update(near_turn, 30_500);
    assert_eq!(out.advanced_to, Some(1));
}

#[test]
fn test_shared_throttle_blocks_navigation_key() {
    let throttle = AnnouncementThrottle::default();
    let mut nav = machine(throttle.clone());
    nav.start(three_step_route(), 0);

    // Someone else announcing under the navigation key resets the window
    throttle.record(NAVIGATION_KEY, 25_000);

    let near_turn = north_of(origin(), 195.0);
    assert_eq!(nav.on_position_update(near_turn, 40_000).advanced_to, None);
    assert_eq!(nav.on_position_update(near_turn, 55_001).advanced_to, Some(1));
}

#[test]
fn test_step_index_never_decreases() {
    let settings = NavigationSettings {
        cooldown_ms: 1,
        ..NavigationSettings::default()
    };
    let mut nav =
        NavigationStateMachine::new(settings, StepFormatter::default(), AnnouncementThrottle::new(1));
    nav.start(three_step_route(), 0);

    let fixes = [
        (north_of(origin(), 190.0), 10),
        (origin(), 20),
        (north_of(origin(), 100.0), 30),
        (north_of(origin(), 190.0), 40),
        (north_of(origin(), 300.0), 50),
    ];

    let mut previous = 0;
    for (fix, now) in fixes {
        nav.on_position_update(fix, now);
        let index = nav.current_step_index().expect("session");
        assert!(index >= previous, "index went from {previous} to {index}");
        previous = index;
    }
    assert_eq!(previous, 1);
}

#[test]
fn test_stop_then_update_is_silent() {
    let mut nav = machine(AnnouncementThrottle::default());
    nav.start(three_step_route(), 0);

    let stop = nav.stop();
    assert_eq!(stop.announcement.as_deref(), Some(NAVIGATION_STOPPED_PHRASE));
    assert_eq!(nav.state(), NavigationState::Idle);

    let out = nav.on_position_update(north_of(origin(), 195.0), 60_000);
    assert_eq!(out, PositionOutcome::default());

    // Second stop has nothing to do
    assert_eq!(nav.stop().announcement, None);
}

#[test]
fn test_restart_replaces_session() {
    let mut nav = machine(AnnouncementThrottle::default());
    nav.start(three_step_route(), 0);
    nav.on_position_update(north_of(origin(), 195.0), 31_000);
    assert_eq!(nav.current_step_index(), Some(1));

    let again = nav.start(three_step_route(), 40_000);
    assert_eq!(again.announcement, "Start by walking on Main St for 200 meters");
    assert_eq!(nav.current_step_index(), Some(0));
    assert_eq!(nav.state(), NavigationState::Navigating);
}

#[test]
fn test_arrived_stop_is_silent() {
    let mut nav = machine(AnnouncementThrottle::default());
    nav.start(three_step_route(), 0);
    nav.on_position_update(north_of(origin(), 195.0), 31_000);
    nav.on_position_update(north_of(origin(), 498.0), 62_000);
    assert_eq!(nav.state(), NavigationState::Arrived);

    let out = nav.stop();
    assert_eq!(out.announcement, None);
    assert_eq!(nav.state(), NavigationState::Idle);
}
