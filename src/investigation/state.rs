//! Investigation State Machine
//!
//! The control state is derived purely from the shape of the last reasoning
//! outcome. No other signal feeds the transition; round budgets and loop
//! guards are enforced by the runner on top of this.

use triage_llm::ToolCall;

/// What one reasoning step produced.
#[derive(Debug, Clone)]
pub enum ReasoningOutcome {
    /// The model requested one or more tool executions
    ToolRequests(Vec<ToolCall>),
    /// The model produced a final analysis with no tool requests
    Final(String),
}

/// Control state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Reasoning and tool execution alternate
    Investigating,
    /// The final analysis is in hand; the formatter runs next
    Finalizing,
    /// The report is attached; the run is complete
    Done,
}

impl ControlState {
    /// Pure transition on a reasoning outcome.
    pub fn next(outcome: &ReasoningOutcome) -> ControlState {
        match outcome {
            ReasoningOutcome::ToolRequests(_) => ControlState::Investigating,
            ReasoningOutcome::Final(_) => ControlState::Finalizing,
        }
    }

    /// Terminal transition once the report is attached. Only a finalizing run
    /// completes; any other state stays where it is.
    pub fn complete(self) -> ControlState {
        match self {
            ControlState::Finalizing => ControlState::Done,
            other => other,
        }
    }
}
