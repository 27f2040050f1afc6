//! Recognized-object announcements
//!
//! Each detection tick delivers a list of [`DetectionEvent`]s. Only
//! allow-listed classes above the confidence floor are considered, and each
//! class goes through the shared [`AnnouncementThrottle`] under its own key.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::phrasing::{PhrasePool, SeededRandom};
use crate::throttle::AnnouncementThrottle;

/// Classes announced when nothing else is configured
pub const DEFAULT_DETECTION_CLASSES: &[&str] = &["person", "chair"];

/// Minimum confidence considered when nothing else is configured
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Phrasings for a detection announcement
pub const DEFAULT_DETECTION_PHRASES: &[&str] = &[
    "{class} detected with {confidence} percent confidence",
    "{class} detected",
];

/// One recognized object from the detection model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Model class label (e.g. "person")
    pub class: String,
    /// Model score in `[0, 1]`
    pub confidence: f32,
}

impl DetectionEvent {
    /// Create an event; confidence is clamped into `[0, 1]`
    #[must_use]
    pub fn new(class: impl Into<String>, confidence: f32) -> Self {
        Self {
            class: class.into(),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
        }
    }

    /// Confidence as a whole percentage
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Turns detection ticks into throttled announcements
#[derive(Debug)]
pub struct DetectionAnnouncer {
    allowed: HashSet<String>,
    min_confidence: f32,
    throttle: AnnouncementThrottle,
    phrases: PhrasePool,
}

impl DetectionAnnouncer {
    /// Create an announcer with the default phrasings picked at random
    #[must_use]
    pub fn new<I, S>(classes: I, min_confidence: f32, throttle: AnnouncementThrottle) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let phrases = PhrasePool::new(
            DEFAULT_DETECTION_PHRASES.iter().copied(),
            SeededRandom::from_entropy(),
        );
        Self::with_phrases(classes, min_confidence, throttle, phrases)
    }

    /// Create an announcer with explicit phrasings
    #[must_use]
    pub fn with_phrases<I, S>(
        classes: I,
        min_confidence: f32,
        throttle: AnnouncementThrottle,
        phrases: PhrasePool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed = classes
            .into_iter()
            .map(|c| c.into().trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            allowed,
            min_confidence,
            throttle,
            phrases,
        }
    }

    /// Whether `class` is on the allow-list
    #[must_use]
    pub fn is_allowed(&self, class: &str) -> bool {
        self.allowed.contains(&class.to_lowercase())
    }

    /// Process one detection tick and return the phrases to speak
    ///
    /// A class appearing several times in one tick is announced at most once;
    /// the highest-confidence instance is used for the phrase.
    pub fn process(&mut self, events: &[DetectionEvent], now_ms: u64) -> Vec<String> {
        let mut candidates: Vec<&DetectionEvent> = events
            .iter()
            .filter(|e| e.confidence >= self.min_confidence && self.is_allowed(&e.class))
            .collect();
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut seen = HashSet::new();
        let mut phrases = Vec::new();

        for event in candidates {
            let key = event.class.to_lowercase();
            if !seen.insert(key.clone()) {
                continue;
            }

            if self.throttle.try_announce(&key, now_ms) {
                let percent = event.percent().to_string();
                let phrase = self
                    .phrases
                    .render(&[("class", event.class.as_str()), ("confidence", &percent)]);
                tracing::debug!(class = %event.class, confidence = event.confidence, "announcing detection");
                phrases.push(phrase);
            } else if let Some(remaining) = self.throttle.remaining_ms(&key, now_ms) {
                tracing::debug!(
                    class = %event.class,
                    remaining_secs = remaining.div_ceil(1000),
                    "detection cooldown"
                );
            }
        }

        phrases
    }
}
