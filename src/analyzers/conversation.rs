use serde_json::{Map, Value};
use tracing::error;

use crate::analyzers::{AnalyzerError, ChatMessage, attach_metadata, deep_update, format_messages};
use crate::gateway::{AnalyzeRequest, DEFAULT_MODEL, ModelGatewayClient};

/// Extracts topics, keywords and a summary from a conversation, and folds new
/// messages into an earlier analysis.
#[derive(Debug, Clone)]
pub struct ConversationAnalyzer {
    gateway: ModelGatewayClient,
    model: String,
}

impl ConversationAnalyzer {
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
    ) -> Result<Map<String, Value>, AnalyzerError> {
        let prompt = conversation_prompt(messages);
        let request = AnalyzeRequest::new(prompt).model(&self.model);

        let mut result = self
            .gateway
            .analyze_request(&request)
            .await
            .inspect_err(|err| error!(error = %err, "conversation analysis failed"))?;

        attach_metadata(&mut result, messages.len());
        Ok(result)
    }

    /// Asks the model what `new_message` changes and deep-merges the answer
    /// into a copy of `previous`.
    pub async fn analyze_realtime(
        &self,
        new_message: &ChatMessage,
        previous: &Map<String, Value>,
    ) -> Result<Map<String, Value>, AnalyzerError> {
        let prompt = realtime_prompt(new_message, previous);
        let request = AnalyzeRequest::new(prompt).model(&self.model);

        let updates = self
            .gateway
            .analyze_request(&request)
            .await
            .inspect_err(|err| error!(error = %err, "realtime analysis failed"))?;

        let mut result = previous.clone();
        deep_update(&mut result, updates);
        Ok(result)
    }
}

fn conversation_prompt(messages: &[ChatMessage]) -> String {
    format!(
        "Analyze the following conversation and respond with a JSON object containing:\n\
         1. topics: list of the main topics discussed\n\
         2. keywords: list of important keywords\n\
         3. summary: a brief summary of the conversation\n\
         4. participants: each participant and their main points\n\
         5. next_actions: suggested follow-up actions\n\
         \n\
         Conversation:\n\
         {}\n",
        format_messages(messages)
    )
}

fn realtime_prompt(new_message: &ChatMessage, previous: &Map<String, Value>) -> String {
    let previous = serde_json::to_string_pretty(previous).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Update the conversation analysis below using the new message.\n\
         Respond with a JSON object containing only the fields that change.\n\
         \n\
         Previous analysis:\n\
         {previous}\n\
         \n\
         New message:\n\
         {}: {}\n",
        new_message.sender, new_message.content
    )
}
