use serde_json::{Map, Value};

use crate::gateway::provider::CallFailure;
use crate::gateway::runtime::{chat_payload, send_chat_request};

const ANTHROPIC_API_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub(crate) struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub(crate) fn new(http: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) async fn complete(
        &self,
        model: &str,
        prompt: &str,
        params: &Map<String, Value>,
    ) -> Result<String, CallFailure> {
        let request = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&chat_payload(model, prompt, params));

        let body = send_chat_request(request).await?;
        extract_text(&body)
    }
}

/// Returns the first `text` content block of a Messages API response.
fn extract_text(body: &Value) -> Result<String, CallFailure> {
    body["content"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|block| block["type"].as_str().is_none_or(|kind| kind == "text"))
        .find_map(|block| block["text"].as_str())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(CallFailure::EmptyResponse)
}
