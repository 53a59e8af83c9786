//! Field-extraction capabilities
//!
//! Three single-call wrappers around the chat model: read text from an
//! image, parse bill text into a [`PaymentRecord`], parse a transfer
//! description into a [`TransferRecord`]. Schema conformance is enforced
//! by the structured-output contract; anything that does not deserialize
//! into the target record is an [`AgentError::Extraction`].

use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ContentPart, ImageUrl, ResponseSchema};
use crate::models::{PaymentRecord, RawText, TransferRecord};
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod prompts;

async fn load_image(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        AgentError::InvalidToolInput(format!("cannot read image '{}': {}", path.display(), e))
    })
}

/// MIME type from the file extension, png when unknown
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

pub struct Extractor {
    model: Arc<dyn ChatModel>,
}

impl Extractor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Read every visible piece of text from a bill, check or invoice image
    pub async fn read_image_text(&self, path: &Path) -> Result<RawText> {
        let data = load_image(path).await?;
        let mime_type = mime_type_for(path);
        if data.is_empty() {
            return Err(AgentError::InvalidToolInput("image is empty".to_string()));
        }

        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(&data));
        let messages = vec![ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: prompts::IMAGE_TEXT_PROMPT.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: data_url },
            },
        ])];

        debug!(bytes = data.len(), %mime_type, "Reading text from image");
        self.structured(messages, "raw_text_output", raw_text_schema()).await
    }

    /// Parse bill text into a payment record with a schedule
    pub async fn parse_bill_text(&self, raw_text: &str) -> Result<PaymentRecord> {
        require_text(raw_text, "raw_text")?;

        let messages = vec![
            ChatMessage::system(prompts::BILL_PARSER_PROMPT),
            ChatMessage::user(format!("{}{}", prompts::BILL_PARSER_USER_PREFIX, raw_text)),
        ];
        self.structured(messages, "payment_info", payment_record_schema()).await
    }

    /// Parse a natural-language transfer description. The result carries no schedule.
    pub async fn extract_transfer_info(&self, text: &str) -> Result<TransferRecord> {
        require_text(text, "text")?;

        let messages = vec![
            ChatMessage::system(prompts::TRANSFER_PROMPT),
            ChatMessage::user(text),
        ];
        self.structured(messages, "transfer_info", transfer_record_schema()).await
    }

    async fn structured<T: DeserializeOwned>(
        &self,
        messages: Vec<ChatMessage>,
        schema_name: &str,
        schema: Value,
    ) -> Result<T> {
        let request = ChatRequest {
            messages,
            tools: Vec::new(),
            response_schema: Some(ResponseSchema {
                name: schema_name.to_string(),
                schema,
            }),
        };

        let reply = self.model.complete(&request).await.map_err(|e| {
            warn!(schema = schema_name, error = %e, "Extraction model call failed");
            AgentError::Extraction(format!("model call failed: {}", e))
        })?;

        let content = reply
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AgentError::Extraction("model returned no content".to_string()))?;

        serde_json::from_str(strip_code_fence(&content)).map_err(|e| {
            warn!(schema = schema_name, error = %e, "Extraction result does not match schema");
            AgentError::Extraction(format!("{} does not match schema: {}", schema_name, e))
        })
    }
}

fn require_text(text: &str, field: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AgentError::InvalidToolInput(format!("'{}' must not be empty", field)));
    }
    Ok(())
}

/// Some compatible backends wrap JSON in ```json fences even in schema mode
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

//
// ================= Schemas =================
//

fn raw_text_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "raw_text": {
                "type": "string",
                "description": "All text extracted from the document"
            }
        },
        "required": ["raw_text"],
        "additionalProperties": false
    })
}

fn transfer_properties() -> serde_json::Map<String, Value> {
    let properties = json!({
        "receiver": {"type": "string", "description": "Name of the person or company receiving the payment"},
        "address": {"type": ["string", "null"], "description": "Address of the receiver"},
        "title": {"type": "string", "description": "Title/reference of the transfer"},
        "amount": {"type": "number", "description": "Amount to pay in PLN"},
        "bank_account": {"type": "string", "description": "Bank account number"}
    });
    match properties {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn payment_record_schema() -> Value {
    let mut properties = transfer_properties();
    properties.insert(
        "schedule".to_string(),
        json!({
            "type": "string",
            "description": "When to send payment in ISO format (YYYY-MM-DD) or 'immediate'"
        }),
    );
    json!({
        "type": "object",
        "properties": properties,
        "required": ["receiver", "address", "title", "amount", "bank_account", "schedule"],
        "additionalProperties": false
    })
}

fn transfer_record_schema() -> Value {
    json!({
        "type": "object",
        "properties": transfer_properties(),
        "required": ["receiver", "address", "title", "amount", "bank_account"],
        "additionalProperties": false
    })
}
