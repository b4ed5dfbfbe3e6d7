//! Structured Report
//!
//! The schema-validated terminal artifact of an investigation run. Created
//! exactly once when the loop finalizes, immutable thereafter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Qualitative classification of a proposed remediation's potential impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Step-by-step trace and diagnosed root cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReasoning {
    pub trace: Vec<String>,
    pub root_cause: String,
    pub confidence_score: f64,
}

/// Proposed remediation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    /// e.g. "send_email", "escalate_slack", "config_rollback"
    #[serde(rename = "type")]
    pub plan_type: String,
    pub risk_level: RiskLevel,
    pub risk_reason: String,
    pub confidence_score: f64,
    /// e.g. {"subject": "...", "body": "..."}
    #[serde(default)]
    pub content: HashMap<String, String>,
    #[serde(default)]
    pub tools_required: Vec<String>,
}

/// Terminal artifact summarizing root cause and proposed remediation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredReport {
    pub ticket_id: String,
    #[serde(default)]
    pub merchant_context: HashMap<String, String>,
    #[serde(default)]
    pub input_signals: HashMap<String, serde_json::Value>,
    pub agent_reasoning: AgentReasoning,
    pub action_plan: ActionPlan,
}

impl StructuredReport {
    /// Enforce the schema constraints serde cannot express.
    ///
    /// Both confidence scores must lie in the closed interval [0, 1] and the
    /// root cause must be non-empty. `risk_level` is already closed by the
    /// enum at deserialization time.
    pub fn validate(&self) -> CoreResult<()> {
        check_confidence("agent_reasoning.confidence_score", self.agent_reasoning.confidence_score)?;
        check_confidence("action_plan.confidence_score", self.action_plan.confidence_score)?;
        if self.agent_reasoning.root_cause.trim().is_empty() {
            return Err(CoreError::validation("agent_reasoning.root_cause is empty"));
        }
        if self.ticket_id.trim().is_empty() {
            return Err(CoreError::validation("ticket_id is empty"));
        }
        Ok(())
    }

    /// JSON schema for the report, in the shape tool-calling APIs accept.
    ///
    /// Used by the output formatter to force schema-conformant extraction.
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": { "type": "string" },
                "merchant_context": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                },
                "input_signals": { "type": "object" },
                "agent_reasoning": {
                    "type": "object",
                    "properties": {
                        "trace": { "type": "array", "items": { "type": "string" } },
                        "root_cause": { "type": "string" },
                        "confidence_score": { "type": "number", "minimum": 0, "maximum": 1 }
                    },
                    "required": ["trace", "root_cause", "confidence_score"]
                },
                "action_plan": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string" },
                        "risk_level": { "type": "string", "enum": ["LOW", "MEDIUM", "HIGH"] },
                        "risk_reason": { "type": "string" },
                        "confidence_score": { "type": "number", "minimum": 0, "maximum": 1 },
                        "content": {
                            "type": "object",
                            "additionalProperties": { "type": "string" }
                        },
                        "tools_required": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["type", "risk_level", "risk_reason", "confidence_score"]
                }
            },
            "required": ["ticket_id", "merchant_context", "input_signals", "agent_reasoning", "action_plan"]
        })
    }
}

fn check_confidence(field: &str, value: f64) -> CoreResult<()> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(CoreError::validation(format!(
            "{} must be in [0, 1], got {}",
            field, value
        )));
    }
    Ok(())
}
