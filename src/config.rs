//! Process-wide configuration
//!
//! Read once from the environment (optionally seeded by `.env`) and shared
//! read-only afterwards.

use crate::error::AgentError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-transcribe";
const DEFAULT_SPEECH_MODEL: &str = "gpt-4o-mini-tts";
const DEFAULT_SPEECH_VOICE: &str = "alloy";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_TOOL_RESULT_CHARS: usize = 8_000;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_PORT: u16 = 2137;

/// What the loop does when the model names a capability that is not registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCapabilityPolicy {
    /// Append a `Capability not found` error to the conversation
    Report,
    /// Drop the call without touching the conversation
    Ignore,
}

impl FromStr for UnknownCapabilityPolicy {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "report" | "error" => Ok(Self::Report),
            "ignore" | "drop" => Ok(Self::Ignore),
            other => Err(AgentError::Config(format!(
                "AGENT_UNKNOWN_CAPABILITY must be 'report' or 'ignore', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub transcription_api_key: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub speech_voice: String,
    pub request_timeout: Duration,
    pub max_tool_result_chars: usize,
    pub unknown_capability: UnknownCapabilityPolicy,
    pub upload_dir: PathBuf,
    pub port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            transcription_api_key: String::new(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            speech_voice: DEFAULT_SPEECH_VOICE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_tool_result_chars: DEFAULT_MAX_TOOL_RESULT_CHARS,
            unknown_capability: UnknownCapabilityPolicy::Report,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            port: DEFAULT_PORT,
        }
    }
}

impl AgentConfig {
    /// Build from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests inject a map here)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let api_key = get("OPENAI_API_KEY").unwrap_or_default();
        let transcription_api_key = get("WHISPER_API").unwrap_or_else(|| api_key.clone());

        let timeout_secs = match get("MODEL_TIMEOUT_SECS") {
            Some(v) => parse_number::<u64>("MODEL_TIMEOUT_SECS", &v)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let max_tool_result_chars = match get("AGENT_MAX_TOOL_RESULT_CHARS") {
            Some(v) => parse_number::<usize>("AGENT_MAX_TOOL_RESULT_CHARS", &v)?,
            None => defaults.max_tool_result_chars,
        };

        let unknown_capability = match get("AGENT_UNKNOWN_CAPABILITY") {
            Some(v) => v.parse()?,
            None => defaults.unknown_capability,
        };

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(v) => parse_number::<u16>("PORT", &v)?,
            None => defaults.port,
        };

        Ok(Self {
            api_key,
            base_url: get("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            chat_model: get("PAYMENT_AGENT_MODEL").unwrap_or(defaults.chat_model),
            transcription_api_key,
            transcription_model: get("TRANSCRIPTION_MODEL").unwrap_or(defaults.transcription_model),
            speech_model: get("TTS_MODEL").unwrap_or(defaults.speech_model),
            speech_voice: get("TTS_VOICE").unwrap_or(defaults.speech_voice),
            request_timeout: Duration::from_secs(timeout_secs),
            max_tool_result_chars,
            unknown_capability,
            upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            port,
        })
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        AgentError::Config(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}
