//! Output Formatter
//!
//! Second model pass: extracts the investigation transcript into a
//! schema-validated `StructuredReport`. Conformance is enforced by forcing a
//! single `emit_report` tool call whose input schema is the report schema,
//! then deserializing and validating the returned arguments. One retry with
//! the failure text fed back before giving up.

use std::sync::Arc;

use tracing::{info, warn};

use triage_core::StructuredReport;
use triage_llm::{
    LlmProvider, LlmRequestOptions, LlmResponse, Message, MessageContent, MessageRole,
    ToolCallMode, ToolDefinition, UsageStats,
};

use super::engine::ReasoningEngine;
use super::prompts::EXTRACTOR_PROMPT;

const EMIT_REPORT: &str = "emit_report";

/// Why an extraction attempt did not yield a valid report.
#[derive(Debug, Clone)]
pub struct FormatFailure {
    pub reason: String,
}

pub struct ReportFormatter {
    engine: ReasoningEngine,
}

impl ReportFormatter {
    pub fn new(provider: Arc<dyn LlmProvider>, max_retries: u32) -> Self {
        Self {
            engine: ReasoningEngine::new(provider, EXTRACTOR_PROMPT.to_string(), max_retries),
        }
    }

    /// Extract a validated report from the conversation history.
    pub async fn format(
        &self,
        history: &[Message],
    ) -> Result<(StructuredReport, UsageStats), FormatFailure> {
        let mut messages = history.to_vec();
        let mut usage = UsageStats::default();
        let options = LlmRequestOptions {
            tool_call_mode: ToolCallMode::Required,
            ..LlmRequestOptions::default()
        };

        // First attempt, then one retry with the failure fed back.
        for attempt in 0..2 {
            let response = self
                .engine
                .send_with_retry(messages.clone(), vec![emit_report_tool()], options.clone())
                .await
                .map_err(|e| FormatFailure {
                    reason: format!("extraction call failed: {}", e),
                })?;
            usage.merge(&response.usage);

            match parse_report(&response) {
                Ok(report) => {
                    info!(model = self.engine.model(), attempt, "report extracted");
                    return Ok((report, usage));
                }
                Err(reason) if attempt == 0 => {
                    warn!(%reason, "report extraction failed, feeding error back");
                    append_feedback(&mut messages, &response, &reason);
                }
                Err(reason) => {
                    return Err(FormatFailure { reason });
                }
            }
        }
        unreachable!("extraction loop returns on the second attempt")
    }
}

fn emit_report_tool() -> ToolDefinition {
    ToolDefinition {
        name: EMIT_REPORT.to_string(),
        description: "Emit the final structured remediation report for this investigation."
            .to_string(),
        input_schema: StructuredReport::json_schema(),
    }
}

fn parse_report(response: &LlmResponse) -> Result<StructuredReport, String> {
    let call = response
        .tool_calls
        .iter()
        .find(|c| c.name == EMIT_REPORT)
        .ok_or_else(|| format!("model did not call {}", EMIT_REPORT))?;

    let report: StructuredReport = serde_json::from_value(call.arguments.clone())
        .map_err(|e| format!("report deserialization failed: {}", e))?;
    report
        .validate()
        .map_err(|e| format!("report validation failed: {}", e))?;
    Ok(report)
}

/// Append the failed attempt and its error so the retry can correct itself.
fn append_feedback(messages: &mut Vec<Message>, response: &LlmResponse, reason: &str) {
    match response.tool_calls.iter().find(|c| c.name == EMIT_REPORT) {
        Some(call) => {
            messages.push(Message {
                role: MessageRole::Assistant,
                content: vec![MessageContent::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                }],
            });
            messages.push(Message::tool_result(
                &call.id,
                format!("Invalid report: {}. Emit a corrected report.", reason),
                true,
            ));
        }
        None => {
            messages.push(Message::assistant(
                response.content.clone().unwrap_or_default(),
            ));
            messages.push(Message::user(format!(
                "That response was invalid: {}. Call {} with a complete, valid report.",
                reason, EMIT_REPORT
            )));
        }
    }
}
