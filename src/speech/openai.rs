//! OpenAI audio endpoints: `/audio/transcriptions` and `/audio/speech`

use super::{SpeechSynthesizer, Transcriber};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::llm::openai::build_http_client;
use crate::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

pub struct OpenAiTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(client: Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    /// Uses `WHISPER_API` when set, otherwise the main OpenAI key
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Ok(Self::new(
            build_http_client(config.request_timeout)?,
            config.transcription_api_key.clone(),
            config.base_url.clone(),
            config.transcription_model.clone(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

fn audio_mime_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => "audio/wav",
    }
}

fn transcript_text(response: TranscriptionResponse) -> Result<String> {
    let text = response.text.trim();
    if text.is_empty() {
        return Err(AgentError::Transcription("empty transcript".to_string()));
    }
    Ok(text.to_string())
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(AgentError::Transcription(
                "WHISPER_API / OPENAI_API_KEY not configured".to_string(),
            ));
        }
        if audio.is_empty() {
            return Err(AgentError::Transcription("no audio data".to_string()));
        }

        debug!(model = %self.model, bytes = audio.len(), file_name, "Transcribing audio");

        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(audio_mime_type(file_name))?;
        let form = Form::new().text("model", self.model.clone()).part("file", part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Transcription request failed: {}", e);
                AgentError::Transcription(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Transcription error response: {}", error_text);
            return Err(AgentError::Transcription(format!("transcription returned {}", status)));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Transcription(format!("parse error: {}", e)))?;

        let text = transcript_text(parsed)?;
        info!(chars = text.chars().count(), "Transcription received");
        Ok(text)
    }
}

pub struct OpenAiSpeech {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    voice: String,
}

impl OpenAiSpeech {
    pub fn new(client: Client, api_key: String, base_url: String, model: String, voice: String) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            voice,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Ok(Self::new(
            build_http_client(config.request_timeout)?,
            config.api_key.clone(),
            config.base_url.clone(),
            config.speech_model.clone(),
            config.speech_voice.clone(),
        ))
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if self.api_key.is_empty() {
            return Err(AgentError::Speech("OPENAI_API_KEY not configured".to_string()));
        }
        if text.trim().is_empty() {
            return Err(AgentError::Speech("nothing to say".to_string()));
        }

        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        debug!(model = %self.model, voice = %self.voice, chars = text.chars().count(), "Synthesizing speech");

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Speech request failed: {}", e);
                AgentError::Speech(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Speech error response: {}", error_text);
            return Err(AgentError::Speech(format!("speech returned {}", status)));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| AgentError::Speech(format!("reading audio failed: {}", e)))?;
        Ok(audio.to_vec())
    }
}
