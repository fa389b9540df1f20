//! `chatlens` subcommands.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use thiserror::Error;

use crate::analyzers::{AnalyzerError, ChatMessage};
use crate::config::{AppConfig, ConfigError};
use crate::gateway::{GatewayError, ModelGatewayClient};

/// Conversation, contact and reply commands.
pub mod analyze;
/// `config check`.
pub mod config;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error("Failed to read messages from {input}: {source}")]
    ReadInput {
        input: String,
        #[source]
        source: io::Error,
    },
    #[error("Invalid messages in {input}: expected a JSON array of {{\"sender\", \"content\"}} objects ({source})")]
    DecodeInput {
        input: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("No reply was generated; see the log output for details.")]
    NoReply,
}

/// Loaded configuration plus the gateway built from it.
pub struct Session {
    pub config: AppConfig,
    pub gateway: ModelGatewayClient,
}

impl Session {
    pub fn open(config_path: Option<&Path>) -> Result<Self, CommandError> {
        let config = AppConfig::load(config_path)?;
        let gateway = ModelGatewayClient::new(config.credentials(), config.gateway_settings())?;
        Ok(Self { config, gateway })
    }

    pub fn model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or_else(|| self.config.default_model())
    }
}

/// Reads a JSON message array from `path`, or from stdin when absent.
pub fn read_messages(path: Option<&Path>) -> Result<Vec<ChatMessage>, CommandError> {
    let (input, raw) = match path {
        Some(path) => {
            let input = path.display().to_string();
            let raw = fs::read_to_string(path).map_err(|source| CommandError::ReadInput {
                input: input.clone(),
                source,
            })?;
            (input, raw)
        }
        None => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .map_err(|source| CommandError::ReadInput {
                    input: "stdin".to_string(),
                    source,
                })?;
            ("stdin".to_string(), raw)
        }
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|source| CommandError::DecodeInput { input, source })
}
