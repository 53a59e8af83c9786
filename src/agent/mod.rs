//! Payment agent - the bounded tool-calling loop
//!
//! INPUT → MODEL → (CAPABILITY CALLS → MODEL)* → ANSWER | CEILING
//!
//! Each iteration submits the whole conversation. A reply without tool
//! calls finishes the run; otherwise every requested call runs in the
//! order given and its result (or error text) joins the conversation.
//! After [`MAX_ITERATIONS`] model round-trips the run fails.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::execution::ExecutionEngine;
use crate::extraction::Extractor;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, MessageContent, OpenAiChatClient};
use crate::models::{AgentRun, ExecutionStep};
use crate::tools::create_default_registry;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod context;
pub mod prompt;

pub use context::ContextBudget;
pub use prompt::{bill_image_request, SYSTEM_PROMPT};

pub const MAX_ITERATIONS: u32 = 15;

const MODEL_FAILURE: &str = "Model request failed";

/// Outcome of one iteration. `Running(n)` means `n` model round-trips have completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    Running(u32),
    Finished(String),
    Failed(String),
}

/// Holds only read-only collaborators; every run owns its own
/// conversation and execution history.
pub struct PaymentAgent {
    model: Arc<dyn ChatModel>,
    execution_engine: ExecutionEngine,
    context_budget: ContextBudget,
}

impl PaymentAgent {
    pub fn new(model: Arc<dyn ChatModel>, execution_engine: ExecutionEngine) -> Self {
        Self {
            model,
            execution_engine,
            context_budget: ContextBudget::default(),
        }
    }

    pub fn with_context_budget(mut self, context_budget: ContextBudget) -> Self {
        self.context_budget = context_budget;
        self
    }

    /// Wire the OpenAI-backed model, extractor and registry from config
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatClient::from_config(config)?);
        let extractor = Arc::new(Extractor::new(model.clone()));
        let engine = ExecutionEngine::new(create_default_registry(extractor))
            .with_unknown_capability(config.unknown_capability);

        Ok(Self::new(model, engine)
            .with_context_budget(ContextBudget::new(config.max_tool_result_chars)))
    }

    /// `(name, description)` of every registered capability
    pub fn tools_info(&self) -> Vec<(String, String)> {
        self.execution_engine
            .registry()
            .definitions()
            .into_iter()
            .map(|d| (d.name, d.description))
            .collect()
    }

    /// Run one request to completion or to the iteration ceiling
    pub async fn process_request(&self, user_input: &str) -> AgentRun {
        let start_time = Instant::now();

        info!(request = %user_input, "Payment agent: starting run");

        let mut request = ChatRequest {
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_input)],
            tools: self.execution_engine.registry().definitions(),
            response_schema: None,
        };
        let mut execution_history = Vec::new();
        let mut iterations = 0;

        let outcome = loop {
            if iterations >= MAX_ITERATIONS {
                warn!(iterations, "Iteration ceiling reached");
                break Err(AgentError::LoopExhausted { iterations }.to_string());
            }

            iterations += 1;
            match self
                .iterate(iterations, &mut request, &mut execution_history)
                .await
            {
                AgentState::Running(_) => continue,
                AgentState::Finished(answer) => break Ok(answer),
                AgentState::Failed(reason) => break Err(reason),
            }
        };

        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        let (final_answer, error) = match outcome {
            Ok(answer) => (Some(answer), None),
            Err(reason) => (None, Some(reason)),
        };

        match &error {
            None => info!(
                iterations,
                tools_used = execution_history.len(),
                elapsed_ms,
                "Payment agent finished"
            ),
            Some(reason) => warn!(iterations, elapsed_ms, reason = %reason, "Payment agent failed"),
        }

        AgentRun {
            success: error.is_none(),
            final_answer,
            error,
            execution_history,
            iterations,
        }
    }

    /// One model round-trip plus the capability calls it requests
    async fn iterate(
        &self,
        iteration: u32,
        request: &mut ChatRequest,
        execution_history: &mut Vec<ExecutionStep>,
    ) -> AgentState {
        debug!(iteration, messages = request.messages.len(), "Submitting conversation");

        let reply = match self.model.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(iteration, error = %e, "Model round-trip failed");
                return AgentState::Failed(MODEL_FAILURE.to_string());
            }
        };

        debug!(
            iteration,
            finish_reason = ?reply.finish_reason,
            tool_calls = reply.tool_calls.len(),
            "Model replied"
        );

        if reply.tool_calls.is_empty() {
            if reply.finish_reason.as_deref() == Some("length") {
                warn!(iteration, "Final answer cut off at the token limit");
            }
            request.messages.push(reply.to_message());
            return AgentState::Finished(reply.content.unwrap_or_default());
        }

        let mut answered = Vec::with_capacity(reply.tool_calls.len());
        let mut results = Vec::with_capacity(reply.tool_calls.len());

        for call in &reply.tool_calls {
            let dispatch = self.execution_engine.dispatch(call, iteration).await;
            execution_history.push(dispatch.step);

            if let Some(mut message) = dispatch.reply {
                message.content = message.content.take().map(|content| match content {
                    MessageContent::Text(text) => MessageContent::Text(self.context_budget.fit(text)),
                    parts => parts,
                });
                answered.push(call.clone());
                results.push(message);
            }
        }

        // every recorded tool call must be followed by its result message
        let mut turn = reply.to_message();
        turn.tool_calls = answered;
        let has_text = turn
            .content
            .as_ref()
            .is_some_and(|content| !content.as_text().trim().is_empty());
        if has_text || !turn.tool_calls.is_empty() {
            request.messages.push(turn);
        }
        request.messages.extend(results);

        AgentState::Running(iteration)
    }
}
