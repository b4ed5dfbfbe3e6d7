//! Triage Core
//!
//! Foundational traits, error types, and data schemas for the triage agent
//! workspace. This crate has zero dependencies on application-level code
//! (HTTP ingress, database, LLM providers, etc.).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `payload` - Incident trigger payload received by the ingress
//! - `report` - Schema-validated terminal report (`StructuredReport`)
//! - `tool_trait` - Evidence tool abstraction (`EvidenceTool`, `EvidenceRegistry`)
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/async-trait/thiserror** - keeps build times minimal
//! 2. **Trait-based abstractions** - enables mocking, testing, and future crate splitting
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod error;
pub mod payload;
pub mod report;
pub mod tool_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Incident Payload ───────────────────────────────────────────────────
pub use payload::{CorrelatedEvent, IncidentPayload, IncidentSummary, MerchantMigration, TriggerInfo};

// ── Structured Report ──────────────────────────────────────────────────
pub use report::{ActionPlan, AgentReasoning, RiskLevel, StructuredReport};

// ── Evidence Tool Trait ────────────────────────────────────────────────
pub use tool_trait::{EvidenceRegistry, EvidenceTool};
