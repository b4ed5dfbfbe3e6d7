//! Investigation Engine
//!
//! The reasoning loop: seeding, state machine, retrying engine adapter,
//! repeated-call guard, runner, and the report formatter.

pub mod engine;
pub mod formatter;
pub mod guard;
pub mod prompts;
pub mod runner;
pub mod state;

pub use engine::ReasoningEngine;
pub use formatter::ReportFormatter;
pub use guard::RepeatedCallGuard;
pub use prompts::seed_message;
pub use runner::{Conversation, InvestigationLoop, InvestigationOutcome};
pub use state::{ControlState, ReasoningOutcome};
