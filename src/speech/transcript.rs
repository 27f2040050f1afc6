//! In-memory history of spoken utterances

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Entries kept before the oldest are dropped
pub const DEFAULT_TRANSCRIPT_CAPACITY: usize = 200;

/// One spoken utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    /// Increasing id, starting at 1
    pub id: u64,
    /// What was said
    pub text: String,
    /// When it was handed to the voice
    pub spoken_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    entries: VecDeque<TranscriptEntry>,
    next_id: u64,
}

/// Bounded log of utterances, queried incrementally by id
#[derive(Debug)]
pub struct Transcript {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRANSCRIPT_CAPACITY)
    }
}

impl Transcript {
    /// Create a transcript holding at most `capacity` entries
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                next_id: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Append an utterance and return its id
    pub fn push(&self, text: &str) -> u64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;

        if inner.entries.len() >= self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(TranscriptEntry {
            id,
            text: text.to_string(),
            spoken_at: Utc::now(),
        });
        id
    }

    /// Entries with an id greater than `after_id`
    #[must_use]
    pub fn after(&self, after_id: u64) -> Vec<TranscriptEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .iter()
            .filter(|e| e.id > after_id)
            .cloned()
            .collect()
    }

    /// Text of every retained entry, oldest first
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.iter().map(|e| e.text.clone()).collect()
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<TranscriptEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.back().cloned()
    }

    /// Number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    /// Whether nothing has been spoken
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_after_returns_newer_entries() {
        let t = Transcript::default();
        let first = t.push("one");
        t.push("two");
        t.push("three");

        let newer: Vec<String> = t.after(first).into_iter().map(|e| e.text).collect();
        assert_eq!(newer, vec!["two", "three"]);
        assert!(t.after(3).is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let t = Transcript::with_capacity(2);
        t.push("a");
        t.push("b");
        t.push("c");

        assert_eq!(t.texts(), vec!["b", "c"]);
        assert_eq!(t.last().map(|e| e.id), Some(3));
    }
}
