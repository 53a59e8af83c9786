//! OpenAI-compatible chat-completions client
//!
//! Maps our message types onto the chat-completions wire format (tools,
//! vision parts, strict JSON-schema output). Uses a long-lived
//! reqwest::Client for connection pooling.

use super::{AssistantReply, ChatModel, ChatRequest, MessageContent, Role, ToolCall};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

/// Pooled HTTP client shared by the model and speech backends
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .timeout(timeout)
        .build()
        .map_err(AgentError::from)
}

/// Reusable chat client (connection-pooled)
pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.chat_model.clone(),
            config.request_timeout,
        )
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantReply> {
        if self.api_key.is_empty() {
            return Err(AgentError::LlmError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest::from_request(&self.model, request);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            structured = request.response_schema.is_some(),
            "Calling chat completions"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Chat completion request failed: {}", e);
                AgentError::LlmError(format!("chat completion request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Chat completion error response: {}", error_text);
            return Err(AgentError::LlmError(format!(
                "chat completion returned {}",
                status
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat completion: {}", e);
            AgentError::LlmError(format!("chat completion parse error: {}", e))
        })?;

        if let Some(usage) = &completion.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion received"
            );
        }

        completion.into_reply()
    }
}

//
// ================= Wire types =================
//

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat<'a>>,
}

impl<'a> CompletionRequest<'a> {
    fn from_request(model: &'a str, request: &'a ChatRequest) -> Self {
        let messages = request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: m.role,
                content: m.content.as_ref(),
                tool_calls: m.tool_calls.iter().map(WireToolCall::from_call).collect(),
                tool_call_id: m.tool_call_id.as_deref(),
            })
            .collect();

        let tools = request
            .tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunctionDef {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();

        let response_format = request.response_schema.as_ref().map(|s| WireResponseFormat {
            kind: "json_schema",
            json_schema: WireJsonSchema {
                name: &s.name,
                schema: &s.schema,
                strict: true,
            },
        });

        Self {
            model,
            messages,
            temperature: 0.0,
            tools,
            response_format,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a MessageContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl WireToolCall {
    fn from_call(call: &ToolCall) -> Self {
        let arguments = match &call.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        };
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments,
            },
        }
    }

    /// Arguments arrive as a JSON string; unparsable text is passed through
    /// as a string value so the capability can reject it.
    fn into_call(self) -> ToolCall {
        let arguments = serde_json::from_str(&self.function.arguments)
            .unwrap_or(Value::String(self.function.arguments));
        ToolCall {
            id: self.id,
            name: self.function.name,
            arguments,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize)]
struct WireResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: WireJsonSchema<'a>,
}

#[derive(Debug, Serialize)]
struct WireJsonSchema<'a> {
    name: &'a str,
    schema: &'a Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl CompletionResponse {
    fn into_reply(self) -> Result<AssistantReply> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::LlmError("No choices in chat completion".to_string()))?;

        if let Some(refusal) = choice.message.refusal.filter(|r| !r.is_empty()) {
            return Err(AgentError::LlmError(format!("model refused: {}", refusal)));
        }

        Ok(AssistantReply {
            content: choice.message.content,
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(WireToolCall::into_call)
                .collect(),
            finish_reason: choice.finish_reason,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, ResponseSchema, ToolDefinition};
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system("You are a payment processing assistant."),
                ChatMessage::user("Pay 1000 zł to Damian"),
                AssistantReply::with_tool_calls(vec![ToolCall {
                    id: "call_1".into(),
                    name: "extract_transfer_info".into(),
                    arguments: json!({"text": "Pay 1000 zł to Damian"}),
                }])
                .to_message(),
                ChatMessage::tool_result("call_1", "{\"receiver\":\"Damian\"}"),
            ],
            tools: vec![ToolDefinition {
                name: "extract_transfer_info".into(),
                description: "Extract transfer details".into(),
                parameters: json!({"type": "object"}),
            }],
            response_schema: None,
        };

        let value = serde_json::to_value(CompletionRequest::from_request("gpt-4o-mini", &request)).unwrap();

        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "Pay 1000 zł to Damian");

        let call = &value["messages"][2]["tool_calls"][0];
        assert_eq!(call["type"], "function");
        assert_eq!(call["function"]["name"], "extract_transfer_info");
        let args: Value = serde_json::from_str(call["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["text"], "Pay 1000 zł to Damian");
        assert!(value["messages"][2].get("content").is_none());

        assert_eq!(value["messages"][3]["role"], "tool");
        assert_eq!(value["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(value["tools"][0]["function"]["name"], "extract_transfer_info");
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn test_structured_output_format() {
        let request = ChatRequest {
            messages: vec![ChatMessage::user("text")],
            tools: vec![],
            response_schema: Some(ResponseSchema {
                name: "raw_text".into(),
                schema: json!({"type": "object"}),
            }),
        };
        let value = serde_json::to_value(CompletionRequest::from_request("m", &request)).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["name"], "raw_text");
        assert_eq!(value["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn test_response_with_tool_calls() {
        let payload = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "parse_bill_text", "arguments": "{\"raw_text\":\"FV 1\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "format_payment_message", "arguments": "not json"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        });

        let response: CompletionResponse = serde_json::from_value(payload).unwrap();
        let reply = response.into_reply().unwrap();

        assert_eq!(reply.content, None);
        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(reply.tool_calls[0].arguments, json!({"raw_text": "FV 1"}));
        assert_eq!(reply.tool_calls[1].arguments, json!("not json"));
        assert_eq!(reply.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_empty_choices_and_refusal_are_errors() {
        let empty: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(empty.into_reply(), Err(AgentError::LlmError(_))));

        let refused: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": null, "refusal": "I can't help"}}]
        }))
        .unwrap();
        assert!(matches!(refused.into_reply(), Err(AgentError::LlmError(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let client = OpenAiChatClient::new(
            String::new(),
            "http://127.0.0.1:9".into(),
            "gpt-4o-mini".into(),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = client.complete(&ChatRequest::default()).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
