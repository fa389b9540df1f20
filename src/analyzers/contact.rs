use serde_json::{Map, Value};
use tracing::error;

use crate::analyzers::{AnalyzerError, ChatMessage, attach_metadata, format_messages};
use crate::gateway::{AnalyzeRequest, DEFAULT_MODEL, ModelGatewayClient};

/// Builds a contact profile (personality, relationship, tags, interaction
/// suggestions) from the conversation history with that contact.
#[derive(Debug, Clone)]
pub struct ContactAnalyzer {
    gateway: ModelGatewayClient,
    model: String,
}

impl ContactAnalyzer {
    pub fn new(gateway: ModelGatewayClient) -> Self {
        Self {
            gateway,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn analyze(
        &self,
        messages: &[ChatMessage],
        manual_note: Option<&str>,
        current_categories: &[String],
    ) -> Result<Map<String, Value>, AnalyzerError> {
        let prompt = contact_prompt(messages, manual_note, current_categories);
        let request = AnalyzeRequest::new(prompt).model(&self.model);

        let mut result = self
            .gateway
            .analyze_request(&request)
            .await
            .inspect_err(|err| error!(error = %err, "contact analysis failed"))?;

        attach_metadata(&mut result, messages.len());
        Ok(result)
    }
}

fn contact_prompt(
    messages: &[ChatMessage],
    manual_note: Option<&str>,
    current_categories: &[String],
) -> String {
    let note = manual_note
        .map(str::trim)
        .filter(|note| !note.is_empty())
        .unwrap_or("none");
    let categories = if current_categories.is_empty() {
        "none".to_string()
    } else {
        current_categories.join(", ")
    };

    format!(
        "Analyze the following conversation with a contact and build a contact profile.\n\
         Respond with a JSON object containing:\n\
         \n\
         1. profile: the contact's profile\n\
         \x20  - personality: personality traits\n\
         \x20  - communication_style: how they communicate\n\
         \x20  - interests: hobbies and interests\n\
         \x20  - expertise: professional domains\n\
         2. relationship: relationship analysis\n\
         \x20  - interaction_frequency: how often you interact\n\
         \x20  - relationship_type: the kind of relationship\n\
         \x20  - key_topics: main topics discussed\n\
         3. ai_note: a suggested note about this contact\n\
         4. categories: suggested category tags\n\
         5. interaction_suggestions: advice for future interactions\n\
         \x20  - dos: things to do\n\
         \x20  - donts: things to avoid\n\
         \n\
         User's manual note:\n\
         {note}\n\
         \n\
         Current categories:\n\
         {categories}\n\
         \n\
         Conversation:\n\
         {}\n",
        format_messages(messages)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Credentials, GatewaySettings, Provider, RetryPolicy};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::new("contact", "let's go over the technical plan"),
            ChatMessage::new("user", "how about Rust?"),
            ChatMessage::new("contact", "fits well, I shipped something similar"),
        ]
    }

    #[test]
    fn prompt_defaults_note_and_categories_to_none() {
        let prompt = contact_prompt(&history(), None, &[]);

        assert!(prompt.contains("User's manual note:\nnone"));
        assert!(prompt.contains("Current categories:\nnone"));
        assert!(prompt.contains("interaction_suggestions"));
        assert!(prompt.contains("user: how about Rust?"));
    }

    #[test]
    fn prompt_includes_note_and_categories() {
        let categories = vec!["work".to_string(), "tech".to_string()];
        let prompt = contact_prompt(&history(), Some("tech colleague"), &categories);

        assert!(prompt.contains("tech colleague"));
        assert!(prompt.contains("work, tech"));
    }

    #[tokio::test]
    async fn analyze_uses_configured_model_and_adds_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("claude-3-sonnet"))
            .and(body_string_contains("tech colleague"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{
                    "type": "text",
                    "text": json!({ "ai_note": "reliable reviewer", "categories": ["work"] }).to_string()
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let settings = GatewaySettings::default()
            .with_retry(RetryPolicy {
                max_attempts: 1,
                base_delay_ms: 1,
            })
            .with_base_url(Provider::Anthropic, server.uri());
        let gateway =
            ModelGatewayClient::new(Credentials::new().with(Provider::Anthropic, "sk"), settings)
                .expect("gateway");
        let analyzer = ContactAnalyzer::new(gateway).with_model("claude-3-sonnet");

        let result = analyzer
            .analyze(&history(), Some("tech colleague"), &[])
            .await
            .expect("profile");

        assert_eq!(result["ai_note"], json!("reliable reviewer"));
        assert_eq!(result["metadata"]["message_count"], json!(3));
    }
}
