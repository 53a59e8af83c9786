//! Speech-to-text and text-to-speech
//!
//! Audio reaches the agent only as a transcript; spoken answers leave as
//! mp3 bytes. Microphone capture and playback stay outside this crate.

use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

pub mod openai;

pub use openai::{OpenAiSpeech, OpenAiTranscriber};

/// Trait for a transcription backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a recording. `file_name` carries the container format
    /// (`audio.wav`, `note.mp3`). An empty transcript is an error.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String>;
}

/// Trait for a speech synthesis backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into mp3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Synthesize `text` and write the mp3 to `path`
pub async fn save_speech(synthesizer: &dyn SpeechSynthesizer, text: &str, path: &Path) -> Result<()> {
    let audio = synthesizer.synthesize(text).await?;
    tokio::fs::write(path, &audio).await?;
    info!(path = %path.display(), bytes = audio.len(), "Speech saved");
    Ok(())
}
