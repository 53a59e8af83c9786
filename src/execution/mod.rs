//! Execution engine for model-requested capability calls
//!
//! One call in, one [`ExecutionStep`] out. Capability failures become
//! error text for the conversation; nothing here aborts a run.

use crate::config::UnknownCapabilityPolicy;
use crate::error::AgentError;
use crate::llm::{ChatMessage, ToolCall};
use crate::models::{ExecutionStatus, ExecutionStep, ToolInput};
use crate::tools::ToolRegistry;
use std::time::Instant;
use tracing::{debug, warn};

const PREVIEW_CHARS: usize = 200;

/// Result of dispatching one call
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub step: ExecutionStep,
    /// Tool-result message to append, `None` when the call is dropped
    pub reply: Option<ChatMessage>,
}

/// Executes capability calls against the registry
pub struct ExecutionEngine {
    tool_registry: ToolRegistry,
    unknown_capability: UnknownCapabilityPolicy,
}

impl ExecutionEngine {
    pub fn new(tool_registry: ToolRegistry) -> Self {
        Self {
            tool_registry,
            unknown_capability: UnknownCapabilityPolicy::Report,
        }
    }

    pub fn with_unknown_capability(mut self, policy: UnknownCapabilityPolicy) -> Self {
        self.unknown_capability = policy;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    pub async fn dispatch(&self, call: &ToolCall, iteration: u32) -> Dispatch {
        let start = Instant::now();

        let input = ToolInput {
            tool_name: call.name.clone(),
            parameters: call.arguments.clone(),
        };

        let Some(tool) = self.tool_registry.get(&call.name) else {
            let err = AgentError::CapabilityNotFound(call.name.clone());
            warn!(iteration, tool_name = %call.name, "Capability not registered");

            let reply = match self.unknown_capability {
                UnknownCapabilityPolicy::Report => {
                    Some(ChatMessage::tool_result(&call.id, format!("Error: {}", err)))
                }
                UnknownCapabilityPolicy::Ignore => None,
            };

            return Dispatch {
                step: ExecutionStep {
                    iteration,
                    tool_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    status: ExecutionStatus::Skipped,
                    result: None,
                    error: Some(err.to_string()),
                    execution_time_ms: 0,
                },
                reply,
            };
        };

        debug!(iteration, tool_name = %call.name, arguments = %call.arguments, "Executing capability");

        let (status, result, error, content) = match tool.execute(&input).await {
            Ok(output) => {
                let content = output.data.to_string();
                debug!(
                    iteration,
                    tool_name = %call.name,
                    preview = %preview(&content),
                    "Capability succeeded"
                );
                (ExecutionStatus::Success, Some(output.data), None, content)
            }
            Err(e) => {
                let err = AgentError::CapabilityExecution(e.to_string());
                warn!(iteration, tool_name = %call.name, error = %e, "Capability failed");
                (
                    ExecutionStatus::Failed,
                    None,
                    Some(err.to_string()),
                    format!("Error: {}", e),
                )
            }
        };

        Dispatch {
            step: ExecutionStep {
                iteration,
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                status,
                result,
                error,
                execution_time_ms: start.elapsed().as_millis() as u64,
            },
            reply: Some(ChatMessage::tool_result(&call.id, content)),
        }
    }
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
