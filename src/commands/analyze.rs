use std::path::PathBuf;

use clap::Args;
use serde_json::{Map, Value};
use tracing::info;

use crate::agents::{AutoReplyAgent, DEFAULT_TASK_DURATION};
use crate::analyzers::{ChatMessage, ContactAnalyzer, ConversationAnalyzer};
use crate::commands::{CommandError, Session, read_messages};

const CLI_USER: &str = "cli";

#[derive(Debug, Args, Clone)]
pub struct ConversationArgs {
    /// JSON file with `[{"sender": .., "content": ..}]`; stdin when omitted
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub model: Option<String>,
    /// Sender of a follow-up message to fold into the analysis
    #[arg(long, requires = "update_content")]
    pub update_sender: Option<String>,
    /// Content of the follow-up message
    #[arg(long, requires = "update_sender")]
    pub update_content: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ContactArgs {
    /// JSON file with the conversation history; stdin when omitted
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub model: Option<String>,
    /// Your own note about the contact
    #[arg(long)]
    pub note: Option<String>,
    /// Current category tag (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ReplyArgs {
    /// How replies should be written
    #[arg(long)]
    pub instruction: String,
    /// The incoming message to answer
    #[arg(long)]
    pub message: String,
    /// JSON file with the chat history; stdin when omitted
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub model: Option<String>,
}

pub async fn run_conversation(
    session: &Session,
    args: ConversationArgs,
) -> Result<(), CommandError> {
    let messages = read_messages(args.input.as_deref())?;
    let analyzer = ConversationAnalyzer::new(session.gateway.clone())
        .with_model(session.model(args.model.as_deref()));

    let mut result = analyzer.analyze(&messages).await?;
    if let (Some(sender), Some(content)) = (args.update_sender, args.update_content) {
        info!(sender = %sender, "folding follow-up message into analysis");
        let update = ChatMessage::new(sender, content);
        result = analyzer.analyze_realtime(&update, &result).await?;
    }

    print_json(&result);
    Ok(())
}

pub async fn run_contact(session: &Session, args: ContactArgs) -> Result<(), CommandError> {
    let messages = read_messages(args.input.as_deref())?;
    let analyzer = ContactAnalyzer::new(session.gateway.clone())
        .with_model(session.model(args.model.as_deref()));

    let result = analyzer
        .analyze(&messages, args.note.as_deref(), &args.categories)
        .await?;

    print_json(&result);
    Ok(())
}

pub async fn run_reply(session: &Session, args: ReplyArgs) -> Result<(), CommandError> {
    let history = read_messages(args.input.as_deref())?;
    let model = session.model(args.model.as_deref());
    // The agent swallows model errors, so surface configuration mistakes first.
    session.gateway.check_model(model)?;

    let agent = AutoReplyAgent::new(session.gateway.clone()).with_model(model);
    agent.create_task(CLI_USER, args.instruction, DEFAULT_TASK_DURATION);

    let reply = agent
        .handle_message(CLI_USER, &args.message, &history)
        .await
        .ok_or(CommandError::NoReply)?;

    println!("{reply}");
    Ok(())
}

fn print_json(result: &Map<String, Value>) {
    match serde_json::to_string_pretty(result) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{}", Value::Object(result.clone())),
    }
}
