//! Single spoken-output channel
//!
//! Navigation and detection announcements compete for one voice. The
//! [`SpeechArbiter`] lets the newest request win: whatever is playing is
//! cancelled before the next utterance starts. Engine failures stop here.

mod transcript;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::Result;

pub use transcript::{DEFAULT_TRANSCRIPT_CAPACITY, Transcript, TranscriptEntry};

/// A voice engine (local synthesizer, remote TTS, console, ...)
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Speak `text`, resolving when the utterance has finished
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot produce audio
    async fn speak(&self, text: &str) -> Result<()>;

    /// Interrupt any utterance in progress
    async fn cancel(&self);
}

/// Serializes access to the voice with last-write-wins preemption
pub struct SpeechArbiter {
    primary: Arc<dyn SpeechOutput>,
    fallback: Option<Arc<dyn SpeechOutput>>,
    speaking: Arc<AtomicBool>,
    /// Bumped for every utterance; a finishing task only clears `speaking`
    /// if it is still the latest one
    generation: Arc<AtomicU64>,
    /// Held from preemption until the new task is stored
    current: Mutex<Option<JoinHandle<()>>>,
    transcript: Arc<Transcript>,
}

impl std::fmt::Debug for SpeechArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechArbiter")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.as_ref().map(|f| f.name()))
            .field("speaking", &self.is_speaking())
            .finish_non_exhaustive()
    }
}

impl SpeechArbiter {
    /// Create an arbiter over `primary`
    #[must_use]
    pub fn new(primary: Arc<dyn SpeechOutput>) -> Self {
        Self {
            primary,
            fallback: None,
            speaking: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
            transcript: Arc::new(Transcript::default()),
        }
    }

    /// Use `fallback` when the primary engine fails
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn SpeechOutput>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Record utterances into `transcript` instead of a private one
    #[must_use]
    pub fn with_transcript(mut self, transcript: Arc<Transcript>) -> Self {
        self.transcript = transcript;
        self
    }

    /// Whether an utterance is in progress
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Everything handed to the voice so far
    #[must_use]
    pub fn transcript(&self) -> &Arc<Transcript> {
        &self.transcript
    }

    /// Speak `text`, cancelling whatever is currently playing
    ///
    /// Returns once the utterance has been started; playback continues in
    /// the background. Never fails: engine errors are logged. Concurrent
    /// callers are serialized, so only the last one keeps playing.
    pub async fn speak(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let mut current = self.current.lock().await;
        self.interrupt(&mut current).await;

        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.speaking.store(true, Ordering::SeqCst);
        self.transcript.push(text);
        tracing::info!(text, "speaking");

        let primary = Arc::clone(&self.primary);
        let fallback = self.fallback.clone();
        let speaking = Arc::clone(&self.speaking);
        let generation = Arc::clone(&self.generation);
        let text = text.to_string();

        let task = tokio::spawn(async move {
            if let Err(e) = primary.speak(&text).await {
                tracing::warn!(engine = primary.name(), error = %e, "speech engine failed");

                match fallback {
                    Some(fallback) => {
                        if let Err(e) = fallback.speak(&text).await {
                            tracing::warn!(engine = fallback.name(), error = %e, "fallback voice failed, dropping utterance");
                        }
                    }
                    None => tracing::warn!("no fallback voice, dropping utterance"),
                }
            }

            if generation.load(Ordering::SeqCst) == id {
                speaking.store(false, Ordering::SeqCst);
            }
        });

        *current = Some(task);
    }

    /// Cancel any in-flight utterance
    pub async fn stop(&self) {
        let mut current = self.current.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.interrupt(&mut current).await;
        self.speaking.store(false, Ordering::SeqCst);
    }

    /// Wait for the current utterance to finish
    pub async fn finish(&self) {
        let task = self.current.lock().await.take();
        if let Some(task) = task {
            // Aborted or panicked tasks are already logged by the engine
            let _ = task.await;
        }
    }

    /// Abort the running utterance task and tell the engines to go quiet
    async fn interrupt(&self, current: &mut Option<JoinHandle<()>>) {
        let Some(task) = current.take().filter(|t| !t.is_finished()) else {
            return;
        };

        task.abort();
        tracing::debug!("preempting current utterance");
        self.primary.cancel().await;
        if let Some(fallback) = &self.fallback {
            fallback.cancel().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct FailingVoice;

    #[async_trait]
    impl SpeechOutput for FailingVoice {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn speak(&self, _text: &str) -> Result<()> {
            Err(Error::Speech("engine offline".to_string()))
        }

        async fn cancel(&self) {}
    }

    #[tokio::test]
    async fn test_failure_leaves_not_speaking() {
        let arbiter = SpeechArbiter::new(Arc::new(FailingVoice));

        arbiter.speak("hello").await;
        arbiter.finish().await;

        assert!(!arbiter.is_speaking());
        assert_eq!(arbiter.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_text_is_ignored() {
        let arbiter = SpeechArbiter::new(Arc::new(FailingVoice));
        arbiter.speak("   ").await;
        assert!(!arbiter.is_speaking());
        assert!(arbiter.transcript().is_empty());
    }
}
