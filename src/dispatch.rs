//! Tool dispatch loop
//!
//! MODEL → (tool calls?) → EXECUTE → APPEND → MODEL … → TERMINAL
//!
//! The loop ends when the model answers without requesting tools, or
//! fails with `ToolLoopExceededError` once the iteration bound is spent.
//! Unknown tools and failing tools are recorded in the conversation and
//! never abort a round.

use crate::config::ChainConfig;
use crate::error::ChainError;
use crate::model::{invoke_bounded, ModelInvoker, ModelRequest};
use crate::models::{Message, ToolCallRequest, ToolCallResult, ToolDeclaration, ToolOutcome};
use crate::schema::SchemaValidator;
use crate::tools::ToolRegistry;
use crate::Result;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Result of a loop that reached terminal content
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub final_content: String,
    /// Full conversation including tool-role messages and the terminal answer
    pub messages: Vec<Message>,
    /// Every executed (or rejected) tool call, in order
    pub results: Vec<ToolCallResult>,
    /// Model round-trips used
    pub iterations: u32,
}

impl DispatchOutcome {
    pub fn tool_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.role == crate::models::Role::Tool)
    }
}

pub struct ToolDispatchLoop {
    model: String,
    max_iterations: u32,
    call_timeout: Option<Duration>,
}

impl ToolDispatchLoop {
    pub fn new(model: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            model: model.into(),
            max_iterations,
            call_timeout: None,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_iterations: config.max_tool_iterations,
            call_timeout: config.model_timeout,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run until the model stops requesting tools.
    ///
    /// No output schema is sent here; structured output is reserved for
    /// the terminal stage that follows the loop.
    pub async fn run(
        &self,
        invoker: &dyn ModelInvoker,
        initial_messages: Vec<Message>,
        tools: &[ToolDeclaration],
        registry: &ToolRegistry,
    ) -> Result<DispatchOutcome> {
        let mut messages = initial_messages;
        let mut results = Vec::new();

        for iteration in 1..=self.max_iterations {
            debug!(iteration, messages = messages.len(), "Tool dispatch iteration");

            let request = ModelRequest::new(&self.model, &messages).with_tools(tools);
            let response = invoke_bounded(invoker, request, self.call_timeout).await?;

            if response.tool_call_requests.is_empty() {
                info!(iteration, tool_calls = results.len(), "Tool dispatch reached final answer");

                messages.push(Message::assistant(response.content.clone()));
                return Ok(DispatchOutcome {
                    final_content: response.content,
                    messages,
                    results,
                    iterations: iteration,
                });
            }

            debug!(
                iteration,
                tool_count = response.tool_call_requests.len(),
                "Executing tool calls"
            );

            // Round is staged locally so a cancelled round leaves no partial history
            let mut round = Vec::with_capacity(response.tool_call_requests.len());
            for call in &response.tool_call_requests {
                round.push(execute_call(call, registry).await);
            }

            messages.extend(round.iter().map(ToolCallResult::to_message));
            results.extend(round);
        }

        warn!(
            max_iterations = self.max_iterations,
            tool_calls = results.len(),
            "Tool dispatch loop exceeded iteration bound"
        );

        Err(ChainError::ToolLoopExceededError(self.max_iterations))
    }
}

/// Resolve, validate and execute one requested call.
///
/// Never fails: every outcome becomes a `ToolCallResult`.
async fn execute_call(call: &ToolCallRequest, registry: &ToolRegistry) -> ToolCallResult {
    let Some(tool) = registry.resolve(&call.tool_name) else {
        warn!(tool_name = %call.tool_name, "Model requested an unknown tool");
        return ToolCallResult {
            tool_name: call.tool_name.clone(),
            outcome: ToolOutcome::UnknownTool,
            output: error_output(
                "unknown_tool",
                &format!("tool '{}' is not registered", call.tool_name),
            ),
        };
    };

    let arguments = Value::Object(call.arguments.clone());
    if let Err(e) = SchemaValidator::validate_value(arguments, &tool.parameters()) {
        return execution_failure(
            call,
            ChainError::tool(&call.tool_name, format!("invalid arguments: {}", e)),
        );
    }

    let start = Instant::now();
    let arguments = call.arguments.clone();

    // Spawned so a panicking tool only poisons its own result
    let handle = tokio::spawn(async move { tool.execute(arguments).await });
    let _guard = AbortOnDrop(handle.abort_handle());

    let outcome = match handle.await {
        Ok(result) => result,
        Err(join_error) => Err(ChainError::tool(
            &call.tool_name,
            format!("tool task aborted: {}", join_error),
        )),
    };

    let execution_time_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            debug!(tool_name = %call.tool_name, execution_time_ms, "Tool executed");
            ToolCallResult {
                tool_name: call.tool_name.clone(),
                outcome: ToolOutcome::Success,
                output,
            }
        }
        Err(e) => execution_failure(call, e),
    }
}

fn execution_failure(call: &ToolCallRequest, error: ChainError) -> ToolCallResult {
    warn!(tool_name = %call.tool_name, error = %error, "Tool execution failed");

    let message = match error {
        ChainError::ToolExecutionError { message, .. } => message,
        other => other.to_string(),
    };

    ToolCallResult {
        tool_name: call.tool_name.clone(),
        outcome: ToolOutcome::ExecutionError,
        output: error_output("tool_execution_error", &message),
    }
}

fn error_output(kind: &str, message: &str) -> Value {
    json!({
        "error": {
            "kind": kind,
            "message": message,
        }
    })
}

/// Stops a spawned tool if the surrounding chain is cancelled
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
