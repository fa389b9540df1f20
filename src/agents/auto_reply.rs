use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::analyzers::{ChatMessage, format_messages};
use crate::gateway::{AnalyzeRequest, DEFAULT_MODEL, ModelGatewayClient};

pub const DEFAULT_TASK_DURATION: Duration = Duration::from_secs(2 * 60 * 60);

const HISTORY_WINDOW: usize = 10;
const REPLY_TEMPERATURE: f64 = 0.7;

/// Standing instruction to answer messages addressed to one user for a while.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoReplyTask {
    pub user_id: String,
    pub instruction: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub total_replies: u32,
    pub last_reply_at: Option<DateTime<Utc>>,
}

/// Answers incoming messages on behalf of users who set up an auto-reply task.
///
/// The task table lock is only held for bookkeeping, never across a model call.
#[derive(Debug)]
pub struct AutoReplyAgent {
    gateway: ModelGatewayClient,
    model: String,
    tasks: Mutex<HashMap<String, AutoReplyTask>>,
}

impl AutoReplyAgent {
    pub fn new(gateway: ModelGatewayClient) -> Self {
        Self {
            gateway,
            model: DEFAULT_MODEL.to_string(),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Starts (or replaces) the task for `user_id`, active for `duration`.
    pub fn create_task(
        &self,
        user_id: impl Into<String>,
        instruction: impl Into<String>,
        duration: Duration,
    ) -> AutoReplyTask {
        let start_time = Utc::now();
        let end_time = TimeDelta::from_std(duration)
            .ok()
            .and_then(|delta| start_time.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let task = AutoReplyTask {
            user_id: user_id.into(),
            instruction: instruction.into(),
            start_time,
            end_time,
            is_active: true,
            total_replies: 0,
            last_reply_at: None,
        };

        debug!(user_id = %task.user_id, end_time = %task.end_time, "auto-reply task created");
        self.lock_tasks().insert(task.user_id.clone(), task.clone());
        task
    }

    pub fn task(&self, user_id: &str) -> Option<AutoReplyTask> {
        self.lock_tasks().get(user_id).cloned()
    }

    /// Removes the task for `user_id`. Returns whether one existed.
    pub fn cancel_task(&self, user_id: &str) -> bool {
        self.lock_tasks().remove(user_id).is_some()
    }

    /// Drafts a reply to `message_content` for `recipient_id`.
    ///
    /// Returns `None` when the recipient has no live task or when the model
    /// call fails; failures are logged, never raised. A reply whose task was
    /// cancelled or replaced while the model call ran is discarded, so stats
    /// only ever count replies made under the task that produced them.
    pub async fn handle_message(
        &self,
        recipient_id: &str,
        message_content: &str,
        chat_history: &[ChatMessage],
    ) -> Option<String> {
        let (instruction, started) = {
            let mut tasks = self.lock_tasks();
            let task = tasks.get_mut(recipient_id)?;
            if !task.is_active {
                return None;
            }
            if Utc::now() > task.end_time {
                debug!(user_id = recipient_id, "auto-reply task expired");
                task.is_active = false;
                return None;
            }
            (task.instruction.clone(), task.start_time)
        };

        let prompt = reply_prompt(&instruction, chat_history, message_content);
        let request = AnalyzeRequest::new(prompt)
            .model(&self.model)
            .temperature(REPLY_TEMPERATURE);

        let reply = match self.gateway.analyze_request(&request).await {
            Ok(result) => match result.get("content").and_then(|value| value.as_str()) {
                Some(content) => content.to_string(),
                None => {
                    error!(user_id = recipient_id, "generated reply has no string `content` field");
                    return None;
                }
            },
            Err(err) => {
                error!(user_id = recipient_id, error = %err, "generate reply failed");
                return None;
            }
        };

        let mut tasks = self.lock_tasks();
        let Some(task) = tasks
            .get_mut(recipient_id)
            .filter(|task| task.start_time == started)
        else {
            debug!(
                user_id = recipient_id,
                "auto-reply task changed during generation, reply dropped"
            );
            return None;
        };
        task.total_replies += 1;
        task.last_reply_at = Some(Utc::now());
        Some(reply)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, AutoReplyTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn reply_prompt(instruction: &str, chat_history: &[ChatMessage], message_content: &str) -> String {
    let recent = &chat_history[chat_history.len().saturating_sub(HISTORY_WINDOW)..];
    format!(
        "You are replying to messages on the user's behalf.\n\
         \n\
         Instruction: {instruction}\n\
         \n\
         Chat history:\n\
         {}\n\
         \n\
         New message: {message_content}\n\
         \n\
         Write a suitable reply that follows the instruction and fits the context.\n\
         Respond with a JSON object of the form {{\"content\": \"<reply text>\"}}.\n",
        format_messages(recent)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Credentials, GatewaySettings, Provider, RetryPolicy};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn agent_for(server: &MockServer) -> AutoReplyAgent {
        let settings = GatewaySettings::default()
            .with_retry(RetryPolicy {
                max_attempts: 1,
                base_delay_ms: 1,
            })
            .with_base_url(Provider::OpenAi, server.uri());
        let gateway =
            ModelGatewayClient::new(Credentials::new().with(Provider::OpenAi, "sk"), settings)
                .expect("gateway");
        AutoReplyAgent::new(gateway)
    }

    fn reply_with(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": content } }]
        }))
    }

    #[test]
    fn prompt_keeps_only_the_last_ten_messages() {
        let history: Vec<ChatMessage> = (0..15)
            .map(|i| ChatMessage::new("peer", format!("message #{i:02}")))
            .collect();

        let prompt = reply_prompt("be brief", &history, "ping");

        assert!(!prompt.contains("message #04"));
        assert!(prompt.contains("message #05"));
        assert!(prompt.contains("message #14"));
        assert!(prompt.contains("Instruction: be brief"));
        assert!(prompt.contains("New message: ping"));
    }

    #[tokio::test]
    async fn no_task_means_no_reply() {
        let server = MockServer::start().await;
        let agent = agent_for(&server);

        assert_eq!(agent.handle_message("nobody", "hi", &[]).await, None);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn replies_and_updates_statistics() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "temperature": 0.7 })))
            .respond_with(reply_with("{\"content\":\"In a meeting, back soon.\"}"))
            .expect(2)
            .mount(&server)
            .await;
        let agent = agent_for(&server);
        agent.create_task("user123", "I'm in a meeting, answer politely", DEFAULT_TASK_DURATION);
        let history = vec![ChatMessage::new("peer", "which framework should we use?")];

        let first = agent.handle_message("user123", "are you there?", &history).await;
        let second = agent.handle_message("user123", "hello?", &history).await;

        assert_eq!(first.as_deref(), Some("In a meeting, back soon."));
        assert!(second.is_some());
        let task = agent.task("user123").expect("task");
        assert_eq!(task.total_replies, 2);
        assert!(task.last_reply_at.is_some());
    }

    #[tokio::test]
    async fn expired_task_is_deactivated() {
        let server = MockServer::start().await;
        let agent = agent_for(&server);
        agent.create_task("user123", "answer anything", Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(agent.handle_message("user123", "hi", &[]).await, None);
        let task = agent.task("user123").expect("task");
        assert!(!task.is_active);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn failures_and_missing_content_yield_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply_with("{\"text\":\"wrong field\"}"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let agent = agent_for(&server);
        agent.create_task("user123", "answer anything", DEFAULT_TASK_DURATION);

        assert_eq!(agent.handle_message("user123", "one", &[]).await, None);
        assert_eq!(agent.handle_message("user123", "two", &[]).await, None);
        assert_eq!(agent.task("user123").expect("task").total_replies, 0);
    }

    async fn answer_while(agent: &AutoReplyAgent, during_call: impl FnOnce()) -> Option<String> {
        let pending = agent.handle_message("user123", "hi", &[]);
        let interfere = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            during_call();
        };
        tokio::join!(pending, interfere).0
    }

    async fn slow_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                reply_with("{\"content\":\"late reply\"}").set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn reply_is_dropped_when_task_cancelled_mid_call() {
        let server = slow_server().await;
        let agent = agent_for(&server);
        agent.create_task("user123", "answer anything", DEFAULT_TASK_DURATION);

        let reply = answer_while(&agent, || {
            agent.cancel_task("user123");
        })
        .await;

        assert_eq!(reply, None);
        assert!(agent.task("user123").is_none());
    }

    #[tokio::test]
    async fn replacement_task_does_not_inherit_reply_stats() {
        let server = slow_server().await;
        let agent = agent_for(&server);
        agent.create_task("user123", "old instruction", DEFAULT_TASK_DURATION);

        let reply = answer_while(&agent, || {
            agent.create_task("user123", "new instruction", DEFAULT_TASK_DURATION);
        })
        .await;

        assert_eq!(reply, None);
        let task = agent.task("user123").expect("replacement task");
        assert_eq!(task.instruction, "new instruction");
        assert_eq!(task.total_replies, 0);
        assert!(task.last_reply_at.is_none());
    }

    #[test]
    fn cancel_removes_task() {
        let gateway = ModelGatewayClient::configure(Credentials::new()).expect("gateway");
        let agent = AutoReplyAgent::new(gateway);
        agent.create_task("user123", "answer anything", DEFAULT_TASK_DURATION);

        assert!(agent.cancel_task("user123"));
        assert!(!agent.cancel_task("user123"));
        assert!(agent.task("user123").is_none());
    }

    #[test]
    fn huge_duration_saturates_end_time() {
        let gateway = ModelGatewayClient::configure(Credentials::new()).expect("gateway");
        let agent = AutoReplyAgent::new(gateway);

        let task = agent.create_task("user123", "forever", Duration::MAX);

        assert_eq!(task.end_time, DateTime::<Utc>::MAX_UTC);
        assert!(task.is_active);
    }
}
