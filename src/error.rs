//! Error types for the payment agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Capability Errors
    // =============================

    /// Model call failed or returned content that does not fit the schema
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A capability invoked by the loop failed
    #[error("Capability execution error: {0}")]
    CapabilityExecution(String),

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    // =============================
    // Agent / Backend Errors
    // =============================

    #[error("Max iterations reached")]
    LoopExhausted { iterations: u32 },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}
