use serde_json::{Map, Value};

use crate::gateway::provider::CallFailure;
use crate::gateway::runtime::{chat_payload, send_chat_request};

#[derive(Clone)]
pub(crate) struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
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
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&chat_payload(model, prompt, params));

        let body = send_chat_request(request).await?;
        extract_content(&body)
    }
}

fn extract_content(body: &Value) -> Result<String, CallFailure> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(str::to_string)
        .ok_or(CallFailure::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extracts_first_choice_content() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"a\":1}" } }]
        });
        assert_eq!(extract_content(&body).expect("content"), "{\"a\":1}");
    }

    #[test]
    fn null_or_missing_content_is_empty_response() {
        let null_content = json!({ "choices": [{ "message": { "content": null } }] });
        let no_choices = json!({ "choices": [] });

        assert!(matches!(
            extract_content(&null_content),
            Err(CallFailure::EmptyResponse)
        ));
        assert!(matches!(
            extract_content(&no_choices),
            Err(CallFailure::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn posts_chat_completion_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4",
                "messages": [{ "role": "user", "content": "ping" }],
                "temperature": 0.3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "{\"pong\":true}" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(
            reqwest::Client::new(),
            "sk-test".to_string(),
            format!("{}/", server.uri()),
        );
        let mut params = Map::new();
        params.insert("temperature".to_string(), json!(0.3));

        let content = client
            .complete("gpt-4", "ping", &params)
            .await
            .expect("completion");

        assert_eq!(content, "{\"pong\":true}");
    }

    #[tokio::test]
    async fn non_success_status_is_api_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(reqwest::Client::new(), "k".to_string(), server.uri());
        let err = client
            .complete("gpt-4", "ping", &Map::new())
            .await
            .expect_err("401 should fail");

        match err {
            CallFailure::Api { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }
}
