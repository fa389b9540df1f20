//! Prompt-building analyzers over chat histories.
//!
//! Each analyzer renders one prompt, calls the gateway once and stamps the
//! returned object with analysis metadata.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::gateway::GatewayError;

/// Contact profiling.
pub mod contact;
/// Conversation summaries and incremental updates.
pub mod conversation;

pub use contact::ContactAnalyzer;
pub use conversation::ConversationAnalyzer;

/// One line of a chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("model analysis failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// Renders messages as `sender: content` lines.
pub fn format_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.sender, message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn attach_metadata(result: &mut Map<String, Value>, message_count: usize) {
    result.insert(
        "metadata".to_string(),
        json!({
            "analyzed_at": Local::now().to_rfc3339(),
            "message_count": message_count,
        }),
    );
}

/// Merges `updates` into `target`. Nested objects merge key by key; any other
/// value replaces what was there.
pub fn deep_update(target: &mut Map<String, Value>, updates: Map<String, Value>) {
    for (key, value) in updates {
        match value {
            Value::Object(nested) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => deep_update(existing, nested),
                _ => {
                    target.insert(key, Value::Object(nested));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn formats_one_line_per_message() {
        let messages = vec![
            ChatMessage::new("alice", "shall we review progress?"),
            ChatMessage::new("bob", "frontend is 80% done"),
        ];

        assert_eq!(
            format_messages(&messages),
            "alice: shall we review progress?\nbob: frontend is 80% done"
        );
        assert_eq!(format_messages(&[]), "");
    }

    #[test]
    fn deep_update_merges_nested_objects() {
        let mut target = object(json!({
            "summary": "old",
            "participants": { "alice": "lead", "bob": "frontend" },
            "topics": ["progress"]
        }));
        let updates = object(json!({
            "participants": { "bob": "backend", "carol": "qa" },
            "topics": ["timeline"],
            "next_actions": ["ship"]
        }));

        deep_update(&mut target, updates);

        assert_eq!(
            Value::Object(target),
            json!({
                "summary": "old",
                "participants": { "alice": "lead", "bob": "backend", "carol": "qa" },
                "topics": ["timeline"],
                "next_actions": ["ship"]
            })
        );
    }

    #[test]
    fn deep_update_replaces_object_with_scalar() {
        let mut target = object(json!({ "summary": { "short": "x" } }));
        deep_update(&mut target, object(json!({ "summary": "flat" })));
        assert_eq!(target["summary"], json!("flat"));
    }

    #[test]
    fn metadata_records_count_and_timestamp() {
        let mut result = Map::new();
        attach_metadata(&mut result, 3);

        assert_eq!(result["metadata"]["message_count"], json!(3));
        let stamp = result["metadata"]["analyzed_at"].as_str().expect("timestamp");
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }
}
