//! Investigation Loop
//!
//! Drives one run end to end: seed the conversation, alternate reasoning and
//! tool execution until the model stops requesting tools, then run the
//! formatter exactly once. The conversation is append-only; every appended
//! message survives to the transcript fallback.

use std::sync::Arc;

use tracing::{debug, info};

use triage_core::{EvidenceRegistry, IncidentPayload, StructuredReport};
use triage_llm::{Message, MessageContent, MessageRole, ToolCall, ToolDefinition, UsageStats};
use triage_tools::{dispatch, ToolOutcome};

use crate::error::{AgentError, AgentResult};

use super::engine::ReasoningEngine;
use super::formatter::ReportFormatter;
use super::guard::RepeatedCallGuard;
use super::prompts::seed_message;
use super::state::{ControlState, ReasoningOutcome};

/// Append-only message history for one run.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Human-readable rendering for the transcript fallback.
    pub fn transcript(&self) -> Vec<String> {
        self.messages.iter().map(render_message).collect()
    }
}

fn render_message(message: &Message) -> String {
    let role = match message.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
    };
    let body = message
        .content
        .iter()
        .map(|block| match block {
            MessageContent::Text { text } => text.clone(),
            MessageContent::ToolUse { name, input, .. } => {
                format!("[tool call] {}({})", name, input)
            }
            MessageContent::ToolResult {
                content, is_error, ..
            } => {
                if *is_error {
                    format!("[tool error] {}", content)
                } else {
                    format!("[tool result] {}", content)
                }
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}: {}", role, body)
}

/// Result of a completed run.
#[derive(Debug)]
pub struct InvestigationOutcome {
    pub report: StructuredReport,
    pub rounds: u32,
    pub usage: UsageStats,
}

pub struct InvestigationLoop {
    engine: ReasoningEngine,
    formatter: ReportFormatter,
    registry: Arc<EvidenceRegistry>,
    max_rounds: u32,
    repeat_threshold: u32,
}

impl InvestigationLoop {
    pub fn new(
        engine: ReasoningEngine,
        formatter: ReportFormatter,
        registry: Arc<EvidenceRegistry>,
        max_rounds: u32,
        repeat_threshold: u32,
    ) -> Self {
        Self {
            engine,
            formatter,
            registry,
            max_rounds,
            repeat_threshold,
        }
    }

    /// Run one investigation to completion.
    pub async fn run(&self, payload: &IncidentPayload) -> AgentResult<InvestigationOutcome> {
        let mut conversation = Conversation::new();
        conversation.push(seed_message(payload)?);

        let mut guard = RepeatedCallGuard::new(self.repeat_threshold);
        let mut usage = UsageStats::default();
        let tools = tool_definitions(&self.registry);

        let mut rounds = 0;
        let mut final_state = ControlState::Investigating;

        while rounds < self.max_rounds {
            rounds += 1;
            let (outcome, response) = self
                .engine
                .reason(conversation.messages(), tools.clone())
                .await?;
            usage.merge(&response.usage);
            final_state = ControlState::next(&outcome);

            match outcome {
                ReasoningOutcome::Final(text) => {
                    info!(rounds, "model produced final analysis");
                    conversation.push(Message::assistant(text));
                    break;
                }
                ReasoningOutcome::ToolRequests(calls) => {
                    debug!(
                        round = rounds,
                        count = calls.len(),
                        tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                        "dispatching tool batch"
                    );
                    conversation.push(assistant_message(response.content.as_deref(), &calls));

                    for call in &calls {
                        if let Err(trip) = guard.observe(call) {
                            return Err(AgentError::ToolCallLoop {
                                tool: trip.tool,
                                count: trip.count,
                            });
                        }
                    }

                    let outcomes = dispatch(&self.registry, &calls).await;
                    conversation.push(tool_results_message(&outcomes));
                }
            }
        }

        if final_state != ControlState::Finalizing {
            return Err(AgentError::RoundBudgetExhausted {
                rounds: self.max_rounds,
            });
        }

        // Exactly one formatter invocation per run.
        match self.formatter.format(conversation.messages()).await {
            Ok((report, format_usage)) => {
                usage.merge(&format_usage);
                final_state = final_state.complete();
                info!(
                    rounds,
                    state = ?final_state,
                    total_tokens = usage.total_tokens(),
                    "run complete"
                );
                Ok(InvestigationOutcome {
                    report,
                    rounds,
                    usage,
                })
            }
            Err(failure) => Err(AgentError::Formatting {
                reason: failure.reason,
                transcript: conversation.transcript(),
            }),
        }
    }
}

/// Registry tools in the provider's definition shape, registration order.
fn tool_definitions(registry: &EvidenceRegistry) -> Vec<ToolDefinition> {
    registry
        .names()
        .iter()
        .filter_map(|name| registry.get(name))
        .map(|tool| ToolDefinition {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.parameters_schema(),
        })
        .collect()
}

/// The assistant turn as appended to the conversation: optional text plus one
/// tool-use block per requested call.
fn assistant_message(text: Option<&str>, calls: &[ToolCall]) -> Message {
    let mut content = Vec::with_capacity(calls.len() + 1);
    if let Some(text) = text {
        if !text.is_empty() {
            content.push(MessageContent::Text {
                text: text.to_string(),
            });
        }
    }
    for call in calls {
        content.push(MessageContent::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        });
    }
    Message {
        role: MessageRole::Assistant,
        content,
    }
}

/// All results of one batch as a single user message, in request order.
fn tool_results_message(outcomes: &[ToolOutcome]) -> Message {
    Message {
        role: MessageRole::User,
        content: outcomes
            .iter()
            .map(|outcome| MessageContent::ToolResult {
                tool_use_id: outcome.tool_call_id.clone(),
                content: outcome.result.to_content(),
                is_error: !outcome.result.success,
            })
            .collect(),
    }
}
