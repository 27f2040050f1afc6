//! Progress along one route

use crate::route::Route;
use crate::sources::SubscriptionId;

/// One navigation attempt, from start to arrival or stop
///
/// The step index only moves forward. The position subscription feeding the
/// session is owned here so it can be released on arrival or stop.
#[derive(Debug, Clone)]
pub struct NavigationSession {
    route: Route,
    current_step_index: usize,
    active: bool,
    last_announcement_at_ms: u64,
    subscription: Option<SubscriptionId>,
}

impl NavigationSession {
    pub(super) const fn new(route: Route, now_ms: u64) -> Self {
        Self {
            route,
            current_step_index: 0,
            active: true,
            last_announcement_at_ms: now_ms,
            subscription: None,
        }
    }

    /// Route being followed
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Index of the step most recently announced
    #[must_use]
    pub const fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    /// False once the destination is reached
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// When the last navigation announcement was made
    #[must_use]
    pub const fn last_announcement_at_ms(&self) -> u64 {
        self.last_announcement_at_ms
    }

    /// Position subscription currently feeding this session
    #[must_use]
    pub const fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub(super) fn advance_to(&mut self, index: usize, now_ms: u64) {
        debug_assert!(index >= self.current_step_index, "step index must not go backwards");
        self.current_step_index = self.current_step_index.max(index);
        self.last_announcement_at_ms = now_ms;
    }

    pub(super) fn finish(&mut self, now_ms: u64) {
        self.active = false;
        self.last_announcement_at_ms = now_ms;
    }

    pub(super) fn replace_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Option<SubscriptionId> {
        self.subscription.replace(id)
    }

    pub(super) fn take_subscription(&mut self) -> Option<SubscriptionId> {
        self.subscription.take()
    }
}
