//! Position and detection inputs
//!
//! Sources push into the daemon; they never block the caller. The in-memory
//! [`PositionFeed`] and [`DetectionFeed`] back scenario replay and tests.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::Result;
use crate::detection::DetectionEvent;
use crate::geo::Coordinate;

/// Handle returned by [`PositionSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Callback invoked for every position fix
pub type PositionSink = Arc<dyn Fn(Coordinate) + Send + Sync>;

/// Device location service
///
/// Fixes are best-effort: they may be stale, noisy, or arrive in bursts.
pub trait PositionSource: Send + Sync {
    /// Start delivering fixes to `sink`
    fn subscribe(&self, sink: PositionSink) -> SubscriptionId;

    /// Stop delivering fixes for `id`; no call to the sink starts after this
    /// returns
    fn unsubscribe(&self, id: SubscriptionId);

    /// Most recent fix, if any has been seen
    fn last_fix(&self) -> Option<Coordinate>;
}

/// Periodic recognized-object source
#[async_trait]
pub trait DetectionSource: Send + Sync {
    /// Run one detection pass
    ///
    /// # Errors
    ///
    /// Returns error if the model or camera is unavailable
    async fn detect(&self) -> Result<Vec<DetectionEvent>>;
}

/// In-memory position source that fans out published fixes
#[derive(Default)]
pub struct PositionFeed {
    next_id: AtomicU64,
    sinks: Mutex<HashMap<SubscriptionId, PositionSink>>,
    last: Mutex<Option<Coordinate>>,
}

impl fmt::Debug for PositionFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PositionFeed")
            .field("subscribers", &self.subscriber_count())
            .field("last", &self.last_fix())
            .finish()
    }
}

impl PositionFeed {
    /// Create an empty feed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fix and deliver it to every subscriber
    pub fn publish(&self, fix: Coordinate) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(fix);

        // Deliver under the lock so an unsubscribe cannot interleave with a
        // delivery to the same sink
        let sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        for sink in sinks.values() {
            sink(fix);
        }
    }

    /// Number of active subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl PositionSource for PositionFeed {
    fn subscribe(&self, sink: PositionSink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.sinks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, sink);
        tracing::debug!(%id, "position subscription added");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self
            .sinks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        if removed.is_some() {
            tracing::debug!(%id, "position subscription released");
        }
    }

    fn last_fix(&self) -> Option<Coordinate> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Detection source that replays queued frames, one per pass
#[derive(Debug, Default)]
pub struct DetectionFeed {
    frames: Mutex<VecDeque<Vec<DetectionEvent>>>,
}

impl DetectionFeed {
    /// Create an empty feed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for a future pass
    pub fn push(&self, frame: Vec<DetectionEvent>) {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(frame);
    }
}

#[async_trait]
impl DetectionSource for DetectionFeed {
    async fn detect(&self) -> Result<Vec<DetectionEvent>> {
        Ok(self
            .frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_default())
    }
}
