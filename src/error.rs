//! Error Handling
//!
//! Run-level error type for the agent binary. Provider and store errors are
//! converted at the crate boundaries; what remains here is the taxonomy the
//! ingress cares about: fatal reasoning failures, recoverable formatting
//! failures (which keep the transcript), and loop-control aborts.

use thiserror::Error;

use triage_core::CoreError;
use triage_llm::LlmError;

/// Errors surfaced by an investigation run.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The trigger payload carries no investigable signal
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The investigator provider failed after retries were exhausted
    #[error("Reasoning failed: {0}")]
    Reasoning(#[from] LlmError),

    /// The model kept requesting tools past the round budget
    #[error("Round budget exhausted after {rounds} rounds")]
    RoundBudgetExhausted { rounds: u32 },

    /// The model repeated the same tool call past the guard threshold
    #[error("Aborted: {tool} called with identical arguments {count} times")]
    ToolCallLoop { tool: String, count: u32 },

    /// The formatter could not produce a valid report; the transcript is
    /// preserved so the ingress can fall back to it
    #[error("Formatting failed: {reason}")]
    Formatting {
        reason: String,
        transcript: Vec<String>,
    },

    /// Store or core-level errors
    #[error("Store error: {0}")]
    Store(#[from] CoreError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for run-level errors
pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-payload error
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Whether the ingress can answer with a transcript fallback instead of
    /// failing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AgentError::Formatting { .. })
    }
}
