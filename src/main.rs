//! Triage Agent - Service Entry Point

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use triage_agent::investigation::prompts::INVESTIGATOR_PROMPT;
use triage_agent::{server, AppState, ConfigService, InvestigationLoop, ReasoningEngine, ReportFormatter};
use triage_core::EvidenceRegistry;
use triage_llm::OpenAIProvider;
use triage_tools::{register_evidence_tools, EvidenceStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Triage Agent v{} starting", env!("CARGO_PKG_VERSION"));

    let config_service = ConfigService::new().context("loading configuration")?;
    let config = config_service.config().clone();

    let store = EvidenceStore::new(&config.db_path).context("opening evidence store")?;

    let mut registry = EvidenceRegistry::new();
    register_evidence_tools(&mut registry, &store).context("registering evidence tools")?;
    info!(tools = registry.len(), model = %config.model, "evidence toolset ready");

    let investigator = Arc::new(OpenAIProvider::new(config.investigator_provider()));
    let formatter_provider = Arc::new(OpenAIProvider::new(config.formatter_provider()));

    let runner = InvestigationLoop::new(
        ReasoningEngine::new(
            investigator,
            INVESTIGATOR_PROMPT.to_string(),
            config.max_retries,
        ),
        ReportFormatter::new(formatter_provider, config.max_retries),
        Arc::new(registry),
        config.max_rounds,
        config.repeat_threshold,
    );

    server::run(&config.bind_addr, AppState { runner, store }).await
}
