//! Voice engines behind [`SpeechOutput`]
//!
//! [`ConsoleVoice`] prints utterances and is always available; it doubles as
//! the fallback when remote synthesis fails. [`TtsVoice`] (feature `audio`)
//! synthesizes through `OpenAI` or `ElevenLabs` and plays on the speakers.

#[cfg(feature = "audio")]
mod playback;
mod tts;

use std::io::Write;

use async_trait::async_trait;

use crate::Result;
use crate::speech::SpeechOutput;

#[cfg(feature = "audio")]
pub use playback::AudioPlayback;
pub use tts::{
    ELEVENLABS_FEMALE_VOICE, ELEVENLABS_MALE_VOICE, TextToSpeech, TtsProvider, VoiceType,
};

/// Writes each utterance to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleVoice;

#[async_trait]
impl SpeechOutput for ConsoleVoice {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "[voice] {text}")?;
        out.flush()?;
        Ok(())
    }

    async fn cancel(&self) {}
}

/// Accepts every utterance and produces no output
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentVoice;

#[async_trait]
impl SpeechOutput for SilentVoice {
    fn name(&self) -> &'static str {
        "silent"
    }

    async fn speak(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn cancel(&self) {}
}

/// Remote synthesis played through the default output device
#[cfg(feature = "audio")]
pub struct TtsVoice {
    tts: TextToSpeech,
    playback: std::sync::Arc<AudioPlayback>,
}

#[cfg(feature = "audio")]
impl TtsVoice {
    /// Combine a synthesizer with the default speaker
    ///
    /// # Errors
    ///
    /// Returns error if no output device can be opened
    pub fn new(tts: TextToSpeech) -> Result<Self> {
        Ok(Self {
            tts,
            playback: std::sync::Arc::new(AudioPlayback::new()?),
        })
    }
}

#[cfg(feature = "audio")]
#[async_trait]
impl SpeechOutput for TtsVoice {
    fn name(&self) -> &'static str {
        match self.tts.provider() {
            TtsProvider::OpenAI => "openai",
            TtsProvider::ElevenLabs => "elevenlabs",
        }
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let audio = self.tts.synthesize(text).await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");

        let playback = std::sync::Arc::clone(&self.playback);
        tokio::task::spawn_blocking(move || playback.play_mp3_blocking(&audio))
            .await
            .map_err(|e| crate::Error::Audio(e.to_string()))?
    }

    async fn cancel(&self) {
        self.playback.cancel();
    }
}
