//! Webhook Ingress
//!
//! HTTP surface of the agent: the trigger webhook that runs one synchronous
//! investigation per request, and a liveness endpoint that also reports
//! evidence-store reachability.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use triage_core::IncidentPayload;
use triage_tools::EvidenceStore;

use crate::error::AgentError;
use crate::investigation::InvestigationLoop;

/// Application state shared across handlers
pub struct AppState {
    pub runner: InvestigationLoop,
    pub store: EvidenceStore,
}

type AppStateArc = Arc<AppState>;

pub fn router(state: AppStateArc) -> Router {
    Router::new()
        .route("/api/v1/webhook/trigger", post(trigger))
        .route("/health", get(health))
        .with_state(state)
}

/// Run the HTTP server until shutdown.
pub async fn run(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn trigger(
    State(state): State<AppStateArc>,
    Json(payload): Json<IncidentPayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    // One run per trigger: the run id echoes the trigger id so callers can
    // correlate the response with the alert that fired.
    let run_id = payload.trigger.trigger_id.clone();
    info!(
        run_id,
        trigger_type = %payload.trigger.trigger_type,
        "investigation triggered"
    );

    match state.runner.run(&payload).await {
        Ok(outcome) => {
            info!(
                run_id,
                rounds = outcome.rounds,
                risk = outcome.report.action_plan.risk_level.as_str(),
                "investigation succeeded"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "run_id": run_id,
                    "completed_at": Utc::now().to_rfc3339(),
                    "report": outcome.report,
                })),
            )
        }
        Err(AgentError::Formatting { reason, transcript }) => {
            // The investigation itself completed; surface the raw transcript
            // so the run is not lost.
            warn!(run_id, %reason, "report extraction failed, returning transcript");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "error",
                    "run_id": run_id,
                    "reason": reason,
                    "transcript": transcript,
                })),
            )
        }
        Err(e @ AgentError::InvalidPayload(_)) => {
            warn!(run_id, error = %e, "rejecting trigger payload");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "status": "rejected",
                    "run_id": run_id,
                    "detail": e.to_string(),
                })),
            )
        }
        Err(e) => {
            error!(run_id, error = %e, "investigation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "failed",
                    "run_id": run_id,
                    "detail": e.to_string(),
                })),
            )
        }
    }
}

async fn health(State(state): State<AppStateArc>) -> (StatusCode, Json<serde_json::Value>) {
    let store_ok = state.store.is_healthy();
    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if store_ok { "ok" } else { "degraded" },
            "store": if store_ok { "reachable" } else { "unreachable" },
        })),
    )
}
