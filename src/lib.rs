//! Triage Agent - Incident Investigation Service
//!
//! Receives incident trigger payloads over a webhook, runs an iterative
//! LLM-driven investigation against an evidence store, and returns a
//! schema-validated remediation report. It includes:
//! - The investigation state machine and reasoning loop
//! - Report formatting with forced schema conformance
//! - Configuration and the axum webhook ingress

pub mod config;
pub mod error;
pub mod investigation;
pub mod server;

pub use config::{AgentConfig, ConfigService, API_KEY_ENV};
pub use error::{AgentError, AgentResult};
pub use investigation::{
    ControlState, Conversation, InvestigationLoop, InvestigationOutcome, ReasoningEngine,
    ReasoningOutcome, ReportFormatter,
};
pub use server::AppState;
