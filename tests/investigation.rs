//! End-to-end investigation runs against a deterministic scripted provider
//! and an in-memory evidence store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use triage_agent::investigation::prompts::INVESTIGATOR_PROMPT;
use triage_agent::{
    server, AgentError, AppState, InvestigationLoop, ReasoningEngine, ReportFormatter,
};
use triage_core::{EvidenceRegistry, IncidentPayload, RiskLevel};
use triage_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageContent,
    MessageRole, ProviderConfig, StopReason, ToolCall, ToolDefinition, UsageStats,
};
use triage_tools::{register_evidence_tools, EvidenceStore};

/// Provider that replays a fixed script of responses and records every
/// request it receives.
struct ScriptedProvider {
    script: Mutex<VecDeque<LlmResponse>>,
    requests: Mutex<Vec<Vec<Message>>>,
    config: ProviderConfig,
}

impl ScriptedProvider {
    fn new(script: Vec<LlmResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            config: ProviderConfig::default(),
        })
    }

    fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        _system: Option<String>,
        _tools: Vec<ToolDefinition>,
        _request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        self.requests.lock().unwrap().push(messages);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(LlmError::Other {
                message: "script exhausted".to_string(),
            })
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

fn tool_response(calls: Vec<ToolCall>) -> LlmResponse {
    LlmResponse {
        content: None,
        tool_calls: calls,
        stop_reason: StopReason::ToolUse,
        usage: UsageStats {
            input_tokens: 100,
            output_tokens: 20,
        },
        model: "scripted".to_string(),
    }
}

fn final_response(text: &str) -> LlmResponse {
    LlmResponse {
        content: Some(text.to_string()),
        tool_calls: vec![],
        stop_reason: StopReason::EndTurn,
        usage: UsageStats {
            input_tokens: 100,
            output_tokens: 40,
        },
        model: "scripted".to_string(),
    }
}

fn report_response(arguments: serde_json::Value) -> LlmResponse {
    LlmResponse {
        content: None,
        tool_calls: vec![tool_call("f1", "emit_report", arguments)],
        stop_reason: StopReason::ToolUse,
        usage: UsageStats {
            input_tokens: 200,
            output_tokens: 80,
        },
        model: "scripted".to_string(),
    }
}

fn valid_report_arguments() -> serde_json::Value {
    json!({
        "ticket_id": "trig-001",
        "merchant_context": {"merchant_id": "M-77", "migration_stage": "v2"},
        "input_signals": {"trigger": "ERROR_SPIKE", "error_code": "PAYMENT_SESSION_MISSING"},
        "agent_reasoning": {
            "trace": ["fetched logs for E1", "checked migration history for M-77"],
            "root_cause": "Merchant migrated to checkout v2 without enabling session tokens",
            "confidence_score": 0.92
        },
        "action_plan": {
            "type": "CONFIG_FIX",
            "risk_level": "LOW",
            "risk_reason": "Reversible configuration change",
            "confidence_score": 0.88,
            "content": {"summary": "Enable session tokens for merchant M-77"},
            "tools_required": ["fetch_granular_logs", "fetch_migration_diff"]
        }
    })
}

fn incident_payload() -> IncidentPayload {
    serde_json::from_value(json!({
        "trigger": {
            "trigger_id": "trig-001",
            "trigger_type": "ERROR_SPIKE",
            "trigger_reason": "Checkout failures spiking for migrated merchants",
            "detected_at": "2025-11-02T10:15:00Z",
            "time_window_minutes": 15
        },
        "summary": {
            "event_type": "CheckoutFailed",
            "affected_merchants_count": 1,
            "event_count": 34,
            "trend": "rising"
        },
        "correlated_events": [{
            "event_id": "E1",
            "event_type": "CheckoutFailed",
            "merchant_id": "M-77",
            "timestamp": "2025-11-02T10:14:21Z",
            "source": "system",
            "context": {"error_code": "PAYMENT_SESSION_MISSING"}
        }],
        "merchant_context": {
            "M-77": {"migration_stage": "v2", "stage_updated_at": "2025-11-02T09:00:00Z"}
        }
    }))
    .unwrap()
}

fn seeded_registry() -> Arc<EvidenceRegistry> {
    let store = EvidenceStore::new_in_memory().unwrap();
    store
        .insert_technical_event(
            "checkout_failed",
            "E1",
            "M-77",
            &json!({"checkout_mode": "v2"}),
            &json!({"error_code": "PAYMENT_SESSION_MISSING", "stack": "SessionGuard.verify"}),
        )
        .unwrap();
    store
        .insert_stage_update(
            "M-77",
            &json!({"from": "v1", "to": "v2"}),
            "2025-11-02T09:00:00Z",
        )
        .unwrap();
    store
        .insert_doc(
            "PAYMENT_SESSION_MISSING",
            "Checkout v2 requires a session token on every payment request",
            "Enable session tokens in the merchant dashboard",
        )
        .unwrap();

    let mut registry = EvidenceRegistry::new();
    register_evidence_tools(&mut registry, &store).unwrap();
    Arc::new(registry)
}

/// A registry whose store has no schema: every store-backed lookup fails.
fn unreachable_registry() -> Arc<EvidenceRegistry> {
    let manager = r2d2_sqlite::SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
    let store = EvidenceStore::from_pool(pool);

    let mut registry = EvidenceRegistry::new();
    register_evidence_tools(&mut registry, &store).unwrap();
    Arc::new(registry)
}

fn build_loop_with(
    registry: Arc<EvidenceRegistry>,
    investigator: Arc<ScriptedProvider>,
    formatter: Arc<ScriptedProvider>,
    max_rounds: u32,
    repeat_threshold: u32,
) -> InvestigationLoop {
    InvestigationLoop::new(
        ReasoningEngine::new(investigator, INVESTIGATOR_PROMPT.to_string(), 0),
        ReportFormatter::new(formatter, 0),
        registry,
        max_rounds,
        repeat_threshold,
    )
}

fn build_loop(
    investigator: Arc<ScriptedProvider>,
    formatter: Arc<ScriptedProvider>,
    max_rounds: u32,
    repeat_threshold: u32,
) -> InvestigationLoop {
    build_loop_with(
        seeded_registry(),
        investigator,
        formatter,
        max_rounds,
        repeat_threshold,
    )
}

#[tokio::test]
async fn happy_path_produces_validated_report() {
    let investigator = ScriptedProvider::new(vec![
        tool_response(vec![
            tool_call("c1", "fetch_granular_logs", json!({"event_id": "E1"})),
            tool_call("c2", "fetch_migration_diff", json!({"merchant_id": "M-77"})),
        ]),
        final_response("Root cause: v2 migration without session tokens."),
    ]);
    let formatter = ScriptedProvider::new(vec![report_response(valid_report_arguments())]);

    let runner = build_loop(investigator.clone(), formatter.clone(), 12, 3);
    let outcome = runner.run(&incident_payload()).await.unwrap();

    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.report.ticket_id, "trig-001");
    assert_eq!(outcome.report.action_plan.risk_level, RiskLevel::Low);
    assert!(outcome.report.agent_reasoning.confidence_score > 0.9);
    assert!(outcome.usage.total_tokens() > 0);

    // Both scripts fully consumed: the formatter ran exactly once.
    assert_eq!(investigator.remaining(), 0);
    assert_eq!(formatter.remaining(), 0);
    assert_eq!(formatter.requests().len(), 1);
}

#[tokio::test]
async fn tool_results_are_paired_in_request_order() {
    let investigator = ScriptedProvider::new(vec![
        tool_response(vec![
            tool_call("c1", "fetch_granular_logs", json!({"event_id": "E1"})),
            tool_call("c2", "search_api_docs", json!({"query": "PAYMENT_SESSION_MISSING"})),
        ]),
        final_response("done"),
    ]);
    let formatter = ScriptedProvider::new(vec![report_response(valid_report_arguments())]);

    let runner = build_loop(investigator.clone(), formatter, 12, 3);
    runner.run(&incident_payload()).await.unwrap();

    let requests = investigator.requests();
    assert_eq!(requests.len(), 2);

    // The second request sees seed, assistant tool-use turn, and one user
    // message carrying both results in call order.
    let second = &requests[1];
    assert_eq!(second.len(), 3);
    let results = &second[2];
    assert_eq!(results.role, MessageRole::User);
    let ids: Vec<&str> = results
        .content
        .iter()
        .map(|block| match block {
            MessageContent::ToolResult { tool_use_id, .. } => tool_use_id.as_str(),
            other => panic!("expected tool result, got {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);

    match &results.content[0] {
        MessageContent::ToolResult {
            content, is_error, ..
        } => {
            assert!(!*is_error);
            assert!(content.contains("PAYMENT_SESSION_MISSING"));
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn unknown_tool_feeds_error_back_without_aborting() {
    let investigator = ScriptedProvider::new(vec![
        tool_response(vec![
            tool_call("c1", "reboot_production", json!({"service_name": "checkout"})),
            tool_call("c2", "check_platform_health", json!({"service_name": "checkout-api"})),
        ]),
        final_response("done"),
    ]);
    let formatter = ScriptedProvider::new(vec![report_response(valid_report_arguments())]);

    let runner = build_loop(investigator.clone(), formatter, 12, 3);
    let outcome = runner.run(&incident_payload()).await;
    assert!(outcome.is_ok());

    let second = &investigator.requests()[1];
    let results = &second[2];
    match &results.content[0] {
        MessageContent::ToolResult {
            content, is_error, ..
        } => {
            assert!(*is_error);
            assert!(content.starts_with("Unknown tool: reboot_production"));
            assert!(content.contains("check_platform_health"));
        }
        other => panic!("expected tool result, got {:?}", other),
    }
    match &results.content[1] {
        MessageContent::ToolResult { is_error, .. } => assert!(!*is_error),
        other => panic!("expected tool result, got {:?}", other),
    }
}

#[tokio::test]
async fn store_outage_degrades_to_sentinel_and_run_continues() {
    let investigator = ScriptedProvider::new(vec![
        tool_response(vec![tool_call(
            "c1",
            "fetch_granular_logs",
            json!({"event_id": "E1"}),
        )]),
        final_response("No granular evidence available; reasoning from the payload alone."),
    ]);
    let formatter = ScriptedProvider::new(vec![report_response(valid_report_arguments())]);

    let runner = build_loop_with(
        unreachable_registry(),
        investigator.clone(),
        formatter,
        12,
        3,
    );
    let outcome = runner.run(&incident_payload()).await.unwrap();
    assert_eq!(outcome.rounds, 2);

    // The outage surfaces as a normal tool result, not an error, and the
    // model gets the next turn.
    let second = &investigator.requests()[1];
    match &second[2].content[0] {
        MessageContent::ToolResult {
            content, is_error, ..
        } => {
            assert_eq!(content, "Evidence store unavailable.");
            assert!(!*is_error);
        }
        other => panic!("expected tool result, got {:?}", other),
    }
}

#[tokio::test]
async fn conversation_grows_monotonically() {
    let investigator = ScriptedProvider::new(vec![
        tool_response(vec![tool_call(
            "c1",
            "fetch_granular_logs",
            json!({"event_id": "E1"}),
        )]),
        tool_response(vec![tool_call(
            "c2",
            "fetch_migration_diff",
            json!({"merchant_id": "M-77"}),
        )]),
        final_response("done"),
    ]);
    let formatter = ScriptedProvider::new(vec![report_response(valid_report_arguments())]);

    let runner = build_loop(investigator.clone(), formatter, 12, 3);
    runner.run(&incident_payload()).await.unwrap();

    let lengths: Vec<usize> = investigator.requests().iter().map(|r| r.len()).collect();
    assert_eq!(lengths, vec![1, 3, 5]);
}

#[tokio::test]
async fn formatter_validation_failure_retries_once_with_feedback() {
    let investigator = ScriptedProvider::new(vec![final_response("analysis complete")]);

    let mut bad_arguments = valid_report_arguments();
    bad_arguments["agent_reasoning"]["confidence_score"] = json!(1.5);
    let formatter = ScriptedProvider::new(vec![
        report_response(bad_arguments),
        report_response(valid_report_arguments()),
    ]);

    let runner = build_loop(investigator, formatter.clone(), 12, 3);
    let outcome = runner.run(&incident_payload()).await.unwrap();
    assert_eq!(outcome.report.agent_reasoning.confidence_score, 0.92);

    let requests = formatter.requests();
    assert_eq!(requests.len(), 2);
    // The retry request carries the failed attempt and its error result.
    let retry = requests[1].last().unwrap();
    match &retry.content[0] {
        MessageContent::ToolResult {
            content, is_error, ..
        } => {
            assert!(*is_error);
            assert!(content.contains("validation failed"));
        }
        other => panic!("expected error feedback, got {:?}", other),
    }
}

#[tokio::test]
async fn formatter_exhaustion_surfaces_transcript() {
    let investigator = ScriptedProvider::new(vec![
        tool_response(vec![tool_call(
            "c1",
            "fetch_granular_logs",
            json!({"event_id": "E1"}),
        )]),
        final_response("analysis complete"),
    ]);

    let mut bad_arguments = valid_report_arguments();
    bad_arguments["ticket_id"] = json!("");
    let formatter = ScriptedProvider::new(vec![
        report_response(bad_arguments.clone()),
        report_response(bad_arguments),
    ]);

    let runner = build_loop(investigator, formatter, 12, 3);
    let err = runner.run(&incident_payload()).await.unwrap_err();

    match err {
        AgentError::Formatting { reason, transcript } => {
            assert!(reason.contains("validation failed"));
            // Seed, assistant turn, tool results, final analysis.
            assert_eq!(transcript.len(), 4);
            assert!(transcript[0].contains("ERROR_SPIKE"));
            assert!(transcript[3].contains("analysis complete"));
        }
        other => panic!("expected formatting failure, got {:?}", other),
    }
}

#[tokio::test]
async fn repeated_identical_calls_abort_the_run() {
    let same_call = || {
        tool_response(vec![tool_call(
            "c1",
            "fetch_granular_logs",
            json!({"event_id": "E1"}),
        )])
    };
    let investigator = ScriptedProvider::new(vec![same_call(), same_call(), same_call()]);
    let formatter = ScriptedProvider::new(vec![]);

    let runner = build_loop(investigator, formatter.clone(), 12, 3);
    let err = runner.run(&incident_payload()).await.unwrap_err();

    match err {
        AgentError::ToolCallLoop { tool, count } => {
            assert_eq!(tool, "fetch_granular_logs");
            assert_eq!(count, 3);
        }
        other => panic!("expected tool call loop abort, got {:?}", other),
    }
    // The formatter never ran.
    assert!(formatter.requests().is_empty());
}

#[tokio::test]
async fn round_budget_exhaustion_aborts_the_run() {
    let investigator = ScriptedProvider::new(vec![
        tool_response(vec![tool_call(
            "c1",
            "fetch_granular_logs",
            json!({"event_id": "E1"}),
        )]),
        tool_response(vec![tool_call(
            "c2",
            "fetch_granular_logs",
            json!({"event_id": "E2"}),
        )]),
    ]);
    let formatter = ScriptedProvider::new(vec![]);

    let runner = build_loop(investigator, formatter.clone(), 2, 3);
    let err = runner.run(&incident_payload()).await.unwrap_err();

    assert!(matches!(
        err,
        AgentError::RoundBudgetExhausted { rounds: 2 }
    ));
    assert!(formatter.requests().is_empty());
}

#[tokio::test]
async fn empty_payload_is_rejected_before_any_model_call() {
    let investigator = ScriptedProvider::new(vec![]);
    let formatter = ScriptedProvider::new(vec![]);

    let mut payload = incident_payload();
    payload.summary.event_count = 0;
    payload.correlated_events.clear();

    let runner = build_loop(investigator.clone(), formatter, 12, 3);
    let err = runner.run(&payload).await.unwrap_err();

    assert!(matches!(err, AgentError::InvalidPayload(_)));
    assert!(investigator.requests().is_empty());
}

#[tokio::test]
async fn webhook_success_echoes_trigger_id_as_run_id() {
    let investigator = ScriptedProvider::new(vec![final_response("Root cause identified.")]);
    let formatter = ScriptedProvider::new(vec![report_response(valid_report_arguments())]);
    let runner = build_loop(investigator, formatter, 12, 3);
    let store = EvidenceStore::new_in_memory().unwrap();
    let app = server::router(Arc::new(AppState { runner, store }));

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhook/trigger")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&incident_payload()).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["run_id"], "trig-001");
    assert_eq!(body["report"]["ticket_id"], "trig-001");
}

#[tokio::test]
async fn fatal_provider_error_fails_the_run() {
    // Empty script: the first reasoning call errors out.
    let investigator = ScriptedProvider::new(vec![]);
    let formatter = ScriptedProvider::new(vec![]);

    let runner = build_loop(investigator, formatter, 12, 3);
    let err = runner.run(&incident_payload()).await.unwrap_err();
    assert!(matches!(err, AgentError::Reasoning(_)));
}
