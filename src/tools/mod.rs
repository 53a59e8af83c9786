//! Tool trait and registry
//!
//! The four capabilities the agent may invoke, keyed by name. Lookup is a
//! static map built at startup; the model can only reach what is
//! registered here.

use crate::error::AgentError;
use crate::extraction::Extractor;
use crate::formatter::format_payment_message;
use crate::llm::ToolDefinition;
use crate::models::{PaymentDraft, ToolInput, ToolOutput};
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub const EXTRACT_TEXT_FROM_IMAGE: &str = "extract_text_from_image";
pub const PARSE_BILL_TEXT: &str = "parse_bill_text";
pub const FORMAT_PAYMENT_MESSAGE: &str = "format_payment_message";
pub const EXTRACT_TRANSFER_INFO: &str = "extract_transfer_info";

/// Trait for a single capability
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Function definitions for the model request, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() {
        Ok(())
    } else {
        Err(AgentError::InvalidToolInput(
            "tool arguments must be a JSON object".to_string(),
        ))
    }
}

fn require_str<'a>(input: &'a ToolInput, key: &str) -> Result<&'a str> {
    ensure_object_parameters(input)?;
    input
        .parameters
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            AgentError::InvalidToolInput(format!("Expected '{}' string in {} arguments", key, input.tool_name))
        })
}

fn string_parameter(key: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            key: {"type": "string", "description": description}
        },
        "required": [key],
        "additionalProperties": false
    })
}

pub struct ExtractTextFromImageTool {
    extractor: Arc<Extractor>,
}

impl ExtractTextFromImageTool {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait::async_trait]
impl Tool for ExtractTextFromImageTool {
    fn name(&self) -> &'static str {
        EXTRACT_TEXT_FROM_IMAGE
    }

    fn description(&self) -> &'static str {
        "Extract all text from payment-related images (checks, bills, invoices, receipts). \
         Returns JSON with a raw_text field."
    }

    fn parameters(&self) -> Value {
        string_parameter("image_path", "Path to the image file (jpg, png, etc.)")
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let path = require_str(input, "image_path")?;
        let raw = self
            .extractor
            .read_image_text(Path::new(path))
            .await?;
        Ok(ToolOutput::ok(serde_json::to_value(raw)?))
    }
}

pub struct ParseBillTextTool {
    extractor: Arc<Extractor>,
}

impl ParseBillTextTool {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait::async_trait]
impl Tool for ParseBillTextTool {
    fn name(&self) -> &'static str {
        PARSE_BILL_TEXT
    }

    fn description(&self) -> &'static str {
        "Parse raw bill/invoice text into payment details: receiver, address, title, \
         amount, bank_account and schedule (YYYY-MM-DD or 'immediate')."
    }

    fn parameters(&self) -> Value {
        string_parameter("raw_text", "Raw text extracted from a bill or invoice")
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let raw_text = require_str(input, "raw_text")?;
        let record = self.extractor.parse_bill_text(raw_text).await?;
        Ok(ToolOutput::ok(serde_json::to_value(record)?))
    }
}

pub struct ExtractTransferInfoTool {
    extractor: Arc<Extractor>,
}

impl ExtractTransferInfoTool {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait::async_trait]
impl Tool for ExtractTransferInfoTool {
    fn name(&self) -> &'static str {
        EXTRACT_TRANSFER_INFO
    }

    fn description(&self) -> &'static str {
        "Extract transfer details (receiver, address, title, amount, bank_account) from a \
         natural-language transfer description in Polish or English."
    }

    fn parameters(&self) -> Value {
        string_parameter("text", "Natural language description of the transfer")
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let text = require_str(input, "text")?;
        let record = self.extractor.extract_transfer_info(text).await?;
        Ok(ToolOutput::ok(serde_json::to_value(record)?))
    }
}

/// Wraps payment fields into the final message. No model call.
pub struct FormatPaymentMessageTool;

#[async_trait::async_trait]
impl Tool for FormatPaymentMessageTool {
    fn name(&self) -> &'static str {
        FORMAT_PAYMENT_MESSAGE
    }

    fn description(&self) -> &'static str {
        "Format payment information into the final payment message with currency, \
         status and timestamp metadata. Use last."
    }

    fn parameters(&self) -> Value {
        string_parameter(
            "payment_data",
            "JSON string with payment information from parse_bill_text or extract_transfer_info",
        )
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;

        let payment_data = input.parameters.get("payment_data").ok_or_else(|| {
            AgentError::InvalidToolInput("Expected 'payment_data' in arguments".to_string())
        })?;

        let draft: PaymentDraft = match payment_data {
            Value::String(raw) => serde_json::from_str(raw),
            other => serde_json::from_value(other.clone()),
        }
        .map_err(|e| AgentError::InvalidToolInput(format!("payment_data is not valid payment JSON: {}", e)))?;

        Ok(ToolOutput::ok(serde_json::to_value(format_payment_message(draft))?))
    }
}

/// Registry with exactly the four payment capabilities
pub fn create_default_registry(extractor: Arc<Extractor>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(ExtractTextFromImageTool::new(extractor.clone())));
    registry.register(Arc::new(ParseBillTextTool::new(extractor.clone())));
    registry.register(Arc::new(FormatPaymentMessageTool));
    registry.register(Arc::new(ExtractTransferInfoTool::new(extractor)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{AssistantReply, ScriptedChatModel};

    fn input(tool_name: &str, parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: tool_name.to_string(),
            parameters,
        }
    }

    fn registry_with(replies: Vec<AssistantReply>) -> ToolRegistry {
        let model = Arc::new(ScriptedChatModel::from_replies(replies));
        create_default_registry(Arc::new(Extractor::new(model)))
    }

    #[test]
    fn test_default_registry_has_four_capabilities() {
        let registry = registry_with(vec![]);
        assert_eq!(
            registry.list(),
            vec![
                EXTRACT_TEXT_FROM_IMAGE,
                EXTRACT_TRANSFER_INFO,
                FORMAT_PAYMENT_MESSAGE,
                PARSE_BILL_TEXT
            ]
        );
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 4);
        assert!(definitions.iter().all(|d| d.parameters["type"] == "object"));
        assert!(registry.get("transfer_money").is_none());
    }

    #[tokio::test]
    async fn test_format_accepts_json_string_and_object() {
        let tool = FormatPaymentMessageTool;

        let from_string = tool
            .execute(&input(
                FORMAT_PAYMENT_MESSAGE,
                json!({"payment_data": "{\"receiver\":\"NetCom\",\"amount\":89.99,\"schedule\":\"immediate\"}"}),
            ))
            .await
            .unwrap();
        let request = &from_string.data["payment_request"];
        assert_eq!(request["receiver"], "NetCom");
        assert_eq!(request["currency"], "PLN");
        assert_eq!(request["schedule"], "immediate");
        assert_eq!(request["title"], Value::Null);

        let from_object = tool
            .execute(&input(
                FORMAT_PAYMENT_MESSAGE,
                json!({"payment_data": {"receiver": "Damian", "amount": 1000}}),
            ))
            .await
            .unwrap();
        assert_eq!(from_object.data["payment_request"]["schedule"], Value::Null);
    }

    #[tokio::test]
    async fn test_format_rejects_garbage() {
        let tool = FormatPaymentMessageTool;
        let err = tool
            .execute(&input(FORMAT_PAYMENT_MESSAGE, json!({"payment_data": "not json"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolInput(_)));

        let err = tool
            .execute(&input(FORMAT_PAYMENT_MESSAGE, json!("plain string")))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolInput(_)));
    }

    #[tokio::test]
    async fn test_format_rejects_thousands_separated_amount() {
        let tool = FormatPaymentMessageTool;
        let err = tool
            .execute(&input(
                FORMAT_PAYMENT_MESSAGE,
                json!({"payment_data": "{\"receiver\":\"Damian\",\"amount\":\"1,000\"}"}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolInput(_)));
    }

    #[tokio::test]
    async fn test_parse_bill_tool_requires_raw_text() {
        let registry = registry_with(vec![]);
        let tool = registry.get(PARSE_BILL_TEXT).unwrap();
        let err = tool
            .execute(&input(PARSE_BILL_TEXT, json!({"text": "wrong key"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolInput(_)));
    }

    #[tokio::test]
    async fn test_transfer_tool_returns_record() {
        let registry = registry_with(vec![AssistantReply::text(
            json!({
                "receiver": "Damian Hujcik",
                "address": null,
                "title": "zwrot",
                "amount": 50.5,
                "bank_account": "1124151"
            })
            .to_string(),
        )]);
        let tool = registry.get(EXTRACT_TRANSFER_INFO).unwrap();
        let output = tool
            .execute(&input(EXTRACT_TRANSFER_INFO, json!({"text": "przelej 50,50 zł Damianowi"})))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.data["amount"], 50.5);
        assert!(output.data.get("schedule").is_none());
    }
}
