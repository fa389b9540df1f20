use std::future::Future;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde_json::{Map, Value, json};
use tokio::time::sleep;
use tracing::warn;

use crate::gateway::provider::{CallFailure, ChatMessage, GatewayError};

const MAX_RETRY_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// Wait before the retry that follows failed attempt `attempt` (0-based):
    /// the base delay doubled per prior failure, never above 30 s.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let delay_ms = 2u64
            .saturating_pow(attempt)
            .saturating_mul(self.base_delay_ms)
            .min(MAX_RETRY_DELAY_MS);
        Duration::from_millis(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned unchanged.
pub(crate) async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let can_retry = err.is_retryable() && attempt + 1 < max_attempts;
                if !can_retry {
                    return Err(err);
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "model call failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Sends one prepared chat request and decodes the JSON envelope.
pub(crate) async fn send_chat_request(request: RequestBuilder) -> Result<Value, CallFailure> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CallFailure::Api { status, body });
    }

    Ok(response.json().await?)
}

/// Builds `{model, messages: [user prompt], ...params}`.
pub(crate) fn chat_payload(model: &str, prompt: &str, params: &Map<String, Value>) -> Value {
    let mut payload = params.clone();
    payload.insert("model".to_string(), Value::String(model.to_string()));
    payload.insert("messages".to_string(), json!([ChatMessage::user(prompt)]));
    Value::Object(payload)
}
