//! Incident Trigger Payload
//!
//! The structured description of a detected problem pattern that seeds an
//! investigation. Produced by the correlation backend and received by the
//! webhook ingress.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identity and detection metadata for a trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerInfo {
    pub trigger_id: String,
    pub trigger_type: String,
    pub trigger_reason: String,
    pub detected_at: String,
    pub time_window_minutes: u32,
}

/// Aggregate counts for the detected pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub event_type: String,
    pub affected_merchants_count: u32,
    pub event_count: u32,
    pub trend: String,
}

/// One event correlated into the trigger window.
///
/// `context` is source-dependent (error codes for system events, ticket
/// category/priority for human signals), so it stays a free-form map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedEvent {
    pub event_id: String,
    pub event_type: String,
    pub merchant_id: String,
    pub timestamp: String,
    pub source: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

/// Migration state for one affected merchant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantMigration {
    pub migration_stage: String,
    pub stage_updated_at: String,
}

/// Full incident payload accepted by the ingress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentPayload {
    pub trigger: TriggerInfo,
    pub summary: IncidentSummary,
    #[serde(default)]
    pub correlated_events: Vec<CorrelatedEvent>,
    /// Keyed by merchant id.
    #[serde(default)]
    pub merchant_context: HashMap<String, MerchantMigration>,
    #[serde(default)]
    pub related_human_signals: Vec<CorrelatedEvent>,
}

impl IncidentPayload {
    /// Whether the payload carries enough signal to seed an investigation.
    ///
    /// A payload with a blank trigger type and neither events nor correlated
    /// context would produce an empty seed message, which the loop rejects.
    pub fn has_signal(&self) -> bool {
        !self.trigger.trigger_type.trim().is_empty()
            && (self.summary.event_count > 0 || !self.correlated_events.is_empty())
    }
}
