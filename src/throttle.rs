//! Per-key announcement cooldown
//!
//! Shared by navigation advances (key [`NAVIGATION_KEY`]) and detection
//! announcements (key = object class). A key may fire again only once strictly
//! more than the cooldown has elapsed since its last successful announcement.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Default cooldown between announcements of the same key (30 seconds)
pub const DEFAULT_COOLDOWN_MS: u64 = 30_000;

/// Throttle key used for navigation step announcements
pub const NAVIGATION_KEY: &str = "navigation";

/// Last successful announcement time per key
pub type CooldownMap = HashMap<String, u64>;

/// Per-key cooldown gate
///
/// Clones share the same map, so one throttle can be handed to both the
/// navigation state machine and the detection announcer.
#[derive(Debug, Clone)]
pub struct AnnouncementThrottle {
    /// Cooldown used by [`AnnouncementThrottle::try_announce`]
    cooldown_ms: u64,
    /// Last announcement timestamp per key
    last: Arc<Mutex<CooldownMap>>,
}

impl Default for AnnouncementThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_MS)
    }
}

impl AnnouncementThrottle {
    /// Create a throttle with the given default cooldown
    #[must_use]
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Default cooldown in milliseconds
    #[must_use]
    pub const fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    /// Check-and-set with the default cooldown. Returns true if the caller
    /// should announce now.
    pub fn try_announce(&self, key: &str, now_ms: u64) -> bool {
        self.try_announce_with(key, now_ms, self.cooldown_ms)
    }

    /// Check-and-set with an explicit cooldown
    ///
    /// On success the key's timestamp becomes `now_ms`. On failure nothing
    /// changes, so a suppressed attempt never extends the window.
    pub fn try_announce_with(&self, key: &str, now_ms: u64, cooldown_ms: u64) -> bool {
        let mut map = self.last.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(&last) = map.get(key) {
            if now_ms.saturating_sub(last) <= cooldown_ms {
                return false;
            }
        }

        map.insert(key.to_string(), now_ms);
        true
    }

    /// Record an announcement that bypassed the gate
    pub fn record(&self, key: &str, now_ms: u64) {
        let mut map = self.last.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), now_ms);
    }

    /// Milliseconds until `key` may fire again under the default cooldown,
    /// or `None` if it may fire now
    #[must_use]
    pub fn remaining_ms(&self, key: &str, now_ms: u64) -> Option<u64> {
        let map = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let last = *map.get(key)?;
        let elapsed = now_ms.saturating_sub(last);

        (elapsed <= self.cooldown_ms).then(|| self.cooldown_ms - elapsed + 1)
    }

    /// Timestamp of the last successful announcement for `key`
    #[must_use]
    pub fn last_announced(&self, key: &str) -> Option<u64> {
        let map = self.last.lock().unwrap_or_else(|e| e.into_inner());
        map.get(key).copied()
    }

    /// Keys that have announced at least once, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let map = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }
}
