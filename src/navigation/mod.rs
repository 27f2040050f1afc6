//! Turn-by-turn navigation state machine
//!
//! ```text
//!   start()            within arrival radius of final step
//! Idle ───────▶ Navigating ─────────────────────────────────▶ Arrived
//!   ▲               │  ▲ advance: next step within turn radius
//!   │   stop()      │  │ and navigation cooldown elapsed
//!   └───────────────┘  └─┘
//! ```
//!
//! The machine is synchronous and owns no I/O. It returns the text to
//! announce and any position subscription the caller must release; the
//! daemon performs the speaking and unsubscribing.

mod session;

use crate::geo::{Coordinate, distance_meters};
use crate::route::{ARRIVAL_PHRASE, Route, StepFormatter};
use crate::sources::SubscriptionId;
use crate::throttle::{AnnouncementThrottle, DEFAULT_COOLDOWN_MS, NAVIGATION_KEY};

pub use session::NavigationSession;

/// Default distance to the next maneuver that triggers its announcement
pub const DEFAULT_TURN_RADIUS_M: f64 = 50.0;

/// Default distance to the final step that counts as arrival
pub const DEFAULT_ARRIVAL_RADIUS_M: f64 = 20.0;

/// Phrase spoken when the user cancels navigation
pub const NAVIGATION_STOPPED_PHRASE: &str = "Navigation stopped";

/// Radii and cooldown for the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationSettings {
    /// Advance when closer than this to the next step
    pub turn_radius_m: f64,
    /// Arrive when closer than this to the final step
    pub arrival_radius_m: f64,
    /// Minimum time between step announcements
    pub cooldown_ms: u64,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            turn_radius_m: DEFAULT_TURN_RADIUS_M,
            arrival_radius_m: DEFAULT_ARRIVAL_RADIUS_M,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

/// Externally visible state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    /// No session
    Idle,
    /// Session active, walking the route
    Navigating,
    /// Final step reached; session inactive
    Arrived,
}

impl std::fmt::Display for NavigationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Navigating => write!(f, "navigating"),
            Self::Arrived => write!(f, "arrived"),
        }
    }
}

/// Result of [`NavigationStateMachine::start`]
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    /// First instruction, always spoken
    pub announcement: String,
    /// Subscription of a replaced session, to be released
    pub release: Option<SubscriptionId>,
}

/// Result of [`NavigationStateMachine::on_position_update`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionOutcome {
    /// Text to speak, if any
    pub announcement: Option<String>,
    /// Step index advanced to by this fix
    pub advanced_to: Option<usize>,
    /// Whether this fix completed the route
    pub arrived: bool,
    /// Subscription to release (set on arrival)
    pub release: Option<SubscriptionId>,
}

/// Result of [`NavigationStateMachine::stop`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopOutcome {
    /// Text to speak, if a session was cancelled
    pub announcement: Option<String>,
    /// Subscription to release
    pub release: Option<SubscriptionId>,
}

/// Tracks progress along one route at a time
#[derive(Debug)]
pub struct NavigationStateMachine {
    settings: NavigationSettings,
    formatter: StepFormatter,
    throttle: AnnouncementThrottle,
    session: Option<NavigationSession>,
}

impl NavigationStateMachine {
    /// Create an idle state machine
    #[must_use]
    pub const fn new(
        settings: NavigationSettings,
        formatter: StepFormatter,
        throttle: AnnouncementThrottle,
    ) -> Self {
        Self {
            settings,
            formatter,
            throttle,
            session: None,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> NavigationState {
        match &self.session {
            None => NavigationState::Idle,
            Some(s) if s.is_active() => NavigationState::Navigating,
            Some(_) => NavigationState::Arrived,
        }
    }

    /// Current (or, after arrival, final) session
    #[must_use]
    pub const fn session(&self) -> Option<&NavigationSession> {
        self.session.as_ref()
    }

    /// Index of the step most recently announced
    #[must_use]
    pub fn current_step_index(&self) -> Option<usize> {
        self.session.as_ref().map(NavigationSession::current_step_index)
    }

    /// Configured radii and cooldown
    #[must_use]
    pub const fn settings(&self) -> &NavigationSettings {
        &self.settings
    }

    /// Begin a session on `route` and return the first instruction
    ///
    /// Step 0 is announced regardless of the cooldown. A session already in
    /// progress is replaced; its subscription is handed back for release.
    pub fn start(&mut self, route: Route, now_ms: u64) -> StartOutcome {
        let release = self.session.take().and_then(|mut old| {
            if old.is_active() {
                tracing::info!(step = old.current_step_index(), "replacing active navigation session");
            }
            old.take_subscription()
        });

        let announcement = route
            .step(0)
            .map(|step| self.formatter.format(step))
            .unwrap_or_default();

        tracing::info!(
            steps = route.len(),
            distance_m = route.total_distance_meters(),
            "navigation started"
        );

        self.throttle.record(NAVIGATION_KEY, now_ms);
        self.session = Some(NavigationSession::new(route, now_ms));

        StartOutcome {
            announcement,
            release,
        }
    }

    /// Attach the position subscription feeding this session
    ///
    /// Returns the id back if there is no active session to own it.
    pub fn attach_subscription(&mut self, id: SubscriptionId) -> Option<SubscriptionId> {
        match self.session.as_mut() {
            Some(session) if session.is_active() => session.replace_subscription(id),
            _ => Some(id),
        }
    }

    /// Handle one position fix
    ///
    /// A no-op unless navigating. Advances at most one step per fix, then
    /// checks arrival at the final step independently.
    pub fn on_position_update(&mut self, position: Coordinate, now_ms: u64) -> PositionOutcome {
        let Some(session) = self.session.as_mut().filter(|s| s.is_active()) else {
            tracing::trace!("position update ignored, not navigating");
            return PositionOutcome::default();
        };

        let mut outcome = PositionOutcome::default();
        let next = session.current_step_index() + 1;

        if let Some(next_step) = session.route().step(next) {
            let distance = distance_meters(position, next_step.location);

            if distance < self.settings.turn_radius_m
                && self
                    .throttle
                    .try_announce_with(NAVIGATION_KEY, now_ms, self.settings.cooldown_ms)
            {
                let text = self.formatter.format(next_step);
                session.advance_to(next, now_ms);
                tracing::info!(step = next, distance_m = distance, instruction = %text, "advanced to next step");

                outcome.advanced_to = Some(next);
                outcome.announcement = Some(text);
            } else {
                tracing::trace!(next, distance_m = distance, "not advancing");
            }
        }

        let last = session.route().last_index();
        if session.current_step_index() == last {
            let final_step = &session.route().steps()[last];
            let distance = distance_meters(position, final_step.location);

            if distance < self.settings.arrival_radius_m {
                session.finish(now_ms);
                tracing::info!(distance_m = distance, "arrived at destination");

                // Arrival supersedes a step announcement from the same fix
                outcome.announcement = Some(ARRIVAL_PHRASE.to_string());
                outcome.arrived = true;
                outcome.release = session.take_subscription();
            }
        }

        outcome
    }

    /// Cancel navigation
    ///
    /// From Navigating this speaks [`NAVIGATION_STOPPED_PHRASE`]; from Arrived it
    /// silently returns to Idle; from Idle it does nothing.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(mut session) = self.session.take() else {
            return StopOutcome::default();
        };

        if session.is_active() {
            tracing::info!(step = session.current_step_index(), "navigation stopped");
            StopOutcome {
                announcement: Some(NAVIGATION_STOPPED_PHRASE.to_string()),
                release: session.take_subscription(),
            }
        } else {
            StopOutcome {
                announcement: None,
                release: session.take_subscription(),
            }
        }
    }
}
