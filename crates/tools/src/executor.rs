//! Tool Executor
//!
//! Resolves a batch of tool calls against the evidence registry. Calls run
//! concurrently but outcomes are returned in request order, so the caller can
//! pair them with the calls one-to-one. A bad call (unknown tool, missing
//! argument) produces an error-bearing outcome for that call only; it never
//! aborts its siblings.

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use triage_core::EvidenceRegistry;
use triage_llm::ToolCall;

/// Result of executing a single tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// The string fed back to the model as the tool result block.
    pub fn to_content(&self) -> String {
        if self.success {
            self.output.clone().unwrap_or_default()
        } else {
            self.error.clone().unwrap_or_else(|| "Unknown error".to_string())
        }
    }
}

/// A tool result tagged with the call id it answers.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool_call_id: String,
    pub result: ToolResult,
}

/// Execute a batch of tool calls concurrently.
///
/// The returned vector has one outcome per call, in the same order as the
/// input batch.
pub async fn dispatch(registry: &EvidenceRegistry, batch: &[ToolCall]) -> Vec<ToolOutcome> {
    let futures = batch.iter().map(|call| execute_one(registry, call));
    join_all(futures).await
}

async fn execute_one(registry: &EvidenceRegistry, call: &ToolCall) -> ToolOutcome {
    let result = match registry.get(&call.name) {
        Some(tool) => match extract_argument(&call.arguments, tool.argument_name()) {
            Ok(argument) => {
                debug!(tool = %call.name, argument = %argument, "executing tool call");
                match tool.lookup(&argument).await {
                    Ok(output) => ToolResult::ok(output),
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "tool execution failed");
                        ToolResult::err(format!("Tool execution failed: {}", e))
                    }
                }
            }
            Err(msg) => ToolResult::err(msg),
        },
        None => {
            warn!(tool = %call.name, "model requested unknown tool");
            ToolResult::err(format!(
                "Unknown tool: {}. Available tools: {}",
                call.name,
                registry.names().join(", ")
            ))
        }
    };

    ToolOutcome {
        tool_call_id: call.id.clone(),
        result,
    }
}

/// Pull the single expected string argument out of the call's argument object.
///
/// Non-string scalars are stringified rather than rejected; models sometimes
/// send numeric ids bare.
fn extract_argument(arguments: &Value, name: &str) -> Result<String, String> {
    match arguments.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(format!(
            "Invalid argument '{}': expected a string, got {}",
            name, other
        )),
        None => Err(format!("Missing required argument '{}'", name)),
    }
}
