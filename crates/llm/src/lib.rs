//! Triage LLM
//!
//! Provides a unified interface for the model calls the investigation makes:
//! the reasoning turns (with tool calling) and the extraction pass that
//! produces the structured report. Ships one concrete provider speaking the
//! OpenAI-compatible chat-completions protocol; the `LlmProvider` trait is
//! the seam tests and alternative backends plug into.

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::LlmProvider;
pub use types::*;
