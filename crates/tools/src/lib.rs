//! Triage Tools
//!
//! The evidence layer of the investigation agent:
//! - `store` - pooled SQLite evidence store with per-call connection checkout
//! - `providers` - the six read-only evidence tools
//! - `executor` - `ToolResult`/`ToolOutcome` types and the concurrent batch
//!   dispatcher that resolves tool calls against the registry
//!
//! Evidence tools never raise: store failures are converted to sentinel
//! strings at the provider boundary, and the dispatcher converts anything
//! that still escapes into an error-bearing tool outcome.

pub mod executor;
pub mod providers;
pub mod store;

// Re-export core types
pub use executor::{dispatch, ToolOutcome, ToolResult};
pub use providers::register_evidence_tools;
pub use store::EvidenceStore;
