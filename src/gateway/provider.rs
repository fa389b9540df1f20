use std::env;
use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Anthropic];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider API secrets. A provider without a usable secret is disabled.
#[derive(Clone, Default)]
pub struct Credentials {
    openai: Option<String>,
    anthropic: Option<String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `OPENAI_API_KEY` and `ANTHROPIC_API_KEY` from the environment.
    pub fn from_env() -> Self {
        let mut credentials = Self::new();
        for provider in Provider::ALL {
            if let Ok(value) = env::var(provider.api_key_env()) {
                credentials.set(provider, value);
            }
        }
        credentials
    }

    pub fn with(mut self, provider: Provider, secret: impl Into<String>) -> Self {
        self.set(provider, secret);
        self
    }

    /// Stores `secret` for `provider`. Blank secrets clear the slot.
    pub fn set(&mut self, provider: Provider, secret: impl Into<String>) {
        let secret = secret.into();
        let value = if secret.trim().is_empty() {
            None
        } else {
            Some(secret.trim().to_string())
        };
        match provider {
            Provider::OpenAi => self.openai = value,
            Provider::Anthropic => self.anthropic = value,
        }
    }

    pub fn get(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai.as_deref(),
            Provider::Anthropic => self.anthropic.as_deref(),
        }
    }

    pub fn is_present(&self, provider: Provider) -> bool {
        self.get(provider).is_some()
    }
}

// Secrets never reach logs or panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openai", &self.openai.as_ref().map(|_| "<redacted>"))
            .field("anthropic", &self.anthropic.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Failure of a single provider round trip.
#[derive(Debug, Error)]
pub enum CallFailure {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("response did not contain message content")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unsupported model: {model}")]
    UnsupportedModel { model: String },
    #[error("provider {provider} is not configured for model {model} (set {})", .provider.api_key_env())]
    ProviderUnavailable { provider: Provider, model: String },
    #[error("{provider} call failed: {source}")]
    ProviderCall {
        provider: Provider,
        #[source]
        source: CallFailure,
    },
    #[error("{provider} response is not a JSON object: {source}")]
    ResponseParse {
        provider: Provider,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl GatewayError {
    /// Configuration mistakes fail immediately; everything raised while talking
    /// to the provider is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderCall { .. } | Self::ResponseParse { .. }
        )
    }
}
