//! Reasoning Engine
//!
//! Thin adapter between the investigation loop and an `LlmProvider`. Owns the
//! retry policy: transient errors (rate limits, network, 5xx) are retried
//! with exponential backoff up to a bounded attempt count; everything else
//! fails the call immediately.

use std::sync::Arc;

use tracing::warn;

use triage_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ToolDefinition,
};

use super::state::ReasoningOutcome;

const MAX_DELAY_SECS: u64 = 60;

pub struct ReasoningEngine {
    provider: Arc<dyn LlmProvider>,
    system_prompt: String,
    max_retries: u32,
}

impl ReasoningEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, system_prompt: String, max_retries: u32) -> Self {
        Self {
            provider,
            system_prompt,
            max_retries,
        }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// One reasoning step over the conversation so far.
    pub async fn reason(
        &self,
        messages: &[Message],
        tools: Vec<ToolDefinition>,
    ) -> LlmResult<(ReasoningOutcome, LlmResponse)> {
        let response = self
            .send_with_retry(messages.to_vec(), tools, LlmRequestOptions::default())
            .await?;

        let outcome = if response.has_tool_calls() {
            ReasoningOutcome::ToolRequests(response.tool_calls.clone())
        } else {
            ReasoningOutcome::Final(response.content.clone().unwrap_or_default())
        };
        Ok((outcome, response))
    }

    /// Send with bounded exponential backoff on retryable errors.
    pub async fn send_with_retry(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            let result = self
                .provider
                .send_message(
                    messages.clone(),
                    Some(self.system_prompt.clone()),
                    tools.clone(),
                    request_options.clone(),
                )
                .await;
            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = std::cmp::min(1u64 << attempt, MAX_DELAY_SECS);
                    let wait = e.retry_after_secs().map_or(delay, |r| std::cmp::max(r, delay));
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        wait_secs = wait,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
                }
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }
        Err(last_err.unwrap_or(LlmError::Other {
            message: "Max retries exhausted".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use triage_llm::{ProviderConfig, StopReason, UsageStats};

    struct FlakyProvider {
        failures_before_success: Mutex<u32>,
        config: ProviderConfig,
    }

    impl FlakyProvider {
        fn new(failures: u32) -> Self {
            Self {
                failures_before_success: Mutex::new(failures),
                config: ProviderConfig::default(),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn model(&self) -> &str {
            &self.config.model
        }
        async fn send_message(
            &self,
            _messages: Vec<Message>,
            _system: Option<String>,
            _tools: Vec<ToolDefinition>,
            _request_options: LlmRequestOptions,
        ) -> LlmResult<LlmResponse> {
            let mut remaining = self.failures_before_success.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LlmError::ServerError {
                    message: "upstream hiccup".to_string(),
                    status: Some(503),
                });
            }
            Ok(LlmResponse {
                content: Some("done".to_string()),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: UsageStats::default(),
                model: self.config.model.clone(),
            })
        }
        async fn health_check(&self) -> LlmResult<()> {
            Ok(())
        }
        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    struct AuthFailProvider {
        config: ProviderConfig,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl LlmProvider for AuthFailProvider {
        fn name(&self) -> &'static str {
            "authfail"
        }
        fn model(&self) -> &str {
            &self.config.model
        }
        async fn send_message(
            &self,
            _messages: Vec<Message>,
            _system: Option<String>,
            _tools: Vec<ToolDefinition>,
            _request_options: LlmRequestOptions,
        ) -> LlmResult<LlmResponse> {
            *self.calls.lock().unwrap() += 1;
            Err(LlmError::AuthenticationFailed {
                message: "bad key".to_string(),
            })
        }
        async fn health_check(&self) -> LlmResult<()> {
            Ok(())
        }
        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let engine = ReasoningEngine::new(
            Arc::new(FlakyProvider::new(2)),
            "system".to_string(),
            3,
        );
        let (outcome, _) = engine.reason(&[Message::user("go")], vec![]).await.unwrap();
        match outcome {
            ReasoningOutcome::Final(text) => assert_eq!(text, "done"),
            other => panic!("expected final outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let engine = ReasoningEngine::new(
            Arc::new(FlakyProvider::new(10)),
            "system".to_string(),
            1,
        );
        let err = engine
            .reason(&[Message::user("go")], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ServerError { .. }));
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let provider = Arc::new(AuthFailProvider {
            config: ProviderConfig::default(),
            calls: Mutex::new(0),
        });
        let engine = ReasoningEngine::new(provider.clone(), "system".to_string(), 5);
        let err = engine
            .reason(&[Message::user("go")], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed { .. }));
        assert_eq!(*provider.calls.lock().unwrap(), 1);
    }
}
