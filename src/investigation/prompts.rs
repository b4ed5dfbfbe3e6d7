//! Prompts and Conversation Seeding
//!
//! The fixed investigation protocol, the extractor instructions, and the
//! rendering of an incident payload into the opening user message.

use triage_core::IncidentPayload;
use triage_llm::Message;

use crate::error::{AgentError, AgentResult};

/// Investigation protocol, prepended as the system prompt on every
/// investigator call.
pub const INVESTIGATOR_PROMPT: &str = "\
You are an Expert Site Reliability Engineer (SRE) Agent for a Headless E-commerce Platform.
Your goal is to investigate alerts, identify the ROOT CAUSE, and propose a safe remediation.

**YOUR INVESTIGATION PROTOCOL:**
1. ANALYZE the input trigger. Look for patterns (e.g., \"401 Error\", \"Checkout Failed\").
2. GATHER EVIDENCE using your tools.
   - Always check logs (`fetch_granular_logs`) to see the real error.
   - Check if the merchant changed something recently (`fetch_migration_diff`).
   - Consult the manual (`search_api_docs`) or past cases (`search_resolution_history`).
3. TRIANGULATE. If the logs say \"Missing Token\" and the docs say \"Token Required for V2\", \
and the user just migrated to V2 -> That is the root cause.
4. DECIDE. Once you are confident (or stuck), stop calling tools and provide your final analysis.

**RULES:**
- Do not guess. If you need more info, use a tool.
- If the risk is high (e.g., \"Rollback\"), flag it in your reasoning.
- Be concise.";

/// Extractor instructions for the formatting pass.
pub const EXTRACTOR_PROMPT: &str = "\
You are a Data Extractor producing a structured summary of the SRE investigation above.
Call the `emit_report` tool exactly once with all fields populated accurately:
- input_signals: Summarize what triggered the alert and what logs were found.
- agent_reasoning: Provide the step-by-step trace and final root cause.
- action_plan: Define the best remediation step.
- merchant_context: Extract merchant details.
Ensure the 'confidence_score' reflects how strong the evidence was.";

/// Render the incident payload into the opening user message.
///
/// A payload with no investigable signal is rejected; seeding the loop with
/// an empty incident description would make the first reasoning step
/// hallucinate its own incident.
pub fn seed_message(payload: &IncidentPayload) -> AgentResult<Message> {
    if !payload.has_signal() {
        return Err(AgentError::invalid_payload(
            "trigger payload carries no investigable signal",
        ));
    }

    let trigger_summary = format!(
        "Trigger: {}\nSummary: {} events of type {} detected across {} merchants.",
        payload.trigger.trigger_type,
        payload.summary.event_count,
        payload.summary.event_type,
        payload.summary.affected_merchants_count,
    );

    let full_context = serde_json::to_string_pretty(payload)?;

    Ok(Message::user(format!(
        "Here is the incident report:\n{}\n\nFull Payload Context: {}\n\n\
         Investigate the root cause using your tools.",
        trigger_summary, full_context
    )))
}
