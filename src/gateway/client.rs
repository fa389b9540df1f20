use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::gateway::anthropic::AnthropicClient;
use crate::gateway::openai::OpenAiClient;
use crate::gateway::provider::{CallFailure, Credentials, GatewayError, Provider};
use crate::gateway::registry::{DEFAULT_MODEL, ModelConfig, ModelRegistry, merge_params};
use crate::gateway::runtime::{RetryPolicy, run_with_retry};

pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Parsed model output. Models are prompted to answer with a JSON object.
pub type CallResult = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub registry: ModelRegistry,
    pub retry: RetryPolicy,
    /// Per-request timeout. `None` leaves reqwest's default (no timeout).
    pub timeout_secs: Option<u64>,
    base_urls: HashMap<Provider, String>,
}

impl GatewaySettings {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_base_url(mut self, provider: Provider, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, base_url.into());
        self
    }

    pub fn base_url(&self, provider: Provider) -> &str {
        self.base_urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or_else(|| provider.default_base_url())
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            registry: ModelRegistry::builtin(),
            retry: RetryPolicy::default(),
            timeout_secs: None,
            base_urls: HashMap::new(),
        }
    }
}

/// One call's inputs, with the same defaults the analyzers rely on.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub extra_params: Map<String, Value>,
}

impl AnalyzeRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            extra_params: Map::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_params.insert(key.into(), value);
        self
    }
}

#[derive(Clone)]
enum ProviderClient {
    OpenAi(OpenAiClient),
    Anthropic(AnthropicClient),
}

impl ProviderClient {
    fn build(provider: Provider, http: reqwest::Client, api_key: &str, base_url: &str) -> Self {
        let api_key = api_key.to_string();
        let base_url = base_url.to_string();
        match provider {
            Provider::OpenAi => Self::OpenAi(OpenAiClient::new(http, api_key, base_url)),
            Provider::Anthropic => {
                Self::Anthropic(AnthropicClient::new(http, api_key, base_url))
            }
        }
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        params: &Map<String, Value>,
    ) -> Result<String, CallFailure> {
        match self {
            Self::OpenAi(client) => client.complete(model, prompt, params).await,
            Self::Anthropic(client) => client.complete(model, prompt, params).await,
        }
    }
}

/// Provider-dispatching model client.
///
/// Resolves a logical model name to its provider, merges call parameters and
/// performs the request with bounded exponential-backoff retry. Holds only
/// read-only state, so clones can be shared freely across tasks.
#[derive(Clone)]
pub struct ModelGatewayClient {
    registry: Arc<ModelRegistry>,
    retry: RetryPolicy,
    providers: Arc<HashMap<Provider, ProviderClient>>,
}

// Sub-clients hold API keys, so only the provider names are shown.
impl fmt::Debug for ModelGatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<&str> = self.providers.keys().map(|p| p.as_str()).collect();
        providers.sort_unstable();
        f.debug_struct("ModelGatewayClient")
            .field("models", &self.registry.names())
            .field("retry", &self.retry)
            .field("providers", &providers)
            .finish()
    }
}

impl ModelGatewayClient {
    /// Builds a client with the built-in registry and default retry policy.
    pub fn configure(credentials: Credentials) -> Result<Self, GatewayError> {
        Self::new(credentials, GatewaySettings::default())
    }

    pub fn new(credentials: Credentials, settings: GatewaySettings) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout_secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let http = builder.build().map_err(GatewayError::Client)?;

        let mut providers = HashMap::new();
        for provider in Provider::ALL {
            match credentials.get(provider) {
                Some(api_key) => {
                    let base_url = settings.base_url(provider);
                    info!(provider = %provider, base_url, "provider configured");
                    providers.insert(
                        provider,
                        ProviderClient::build(provider, http.clone(), api_key, base_url),
                    );
                }
                None => info!(provider = %provider, "provider credential missing"),
            }
        }

        Ok(Self {
            registry: Arc::new(settings.registry),
            retry: settings.retry,
            providers: Arc::new(providers),
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn is_configured(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }

    /// Sends `prompt` to `model` and parses the reply as a JSON object.
    ///
    /// Unknown models and unconfigured providers fail immediately. Provider
    /// and parse failures are retried per the retry policy, after which the
    /// last error is returned.
    pub async fn analyze(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
        extra_params: &Map<String, Value>,
    ) -> Result<CallResult, GatewayError> {
        let (config, client) = self.resolve(model)?;
        let provider = config.provider;
        let params = merge_params(temperature, &config.default_params, extra_params);

        let result = run_with_retry(self.retry, |attempt| {
            let params = &params;
            async move {
                debug!(
                    model,
                    provider = %provider,
                    attempt = attempt + 1,
                    "dispatching model call"
                );
                let raw = client
                    .complete(model, prompt, params)
                    .await
                    .map_err(|source| GatewayError::ProviderCall { provider, source })?;
                parse_response(provider, &raw)
            }
        })
        .await;

        if let Err(err) = &result {
            error!(model, error = %err, "analysis failed");
        }
        result
    }

    /// Checks that `model` is registered and its provider has a credential,
    /// without calling it.
    pub fn check_model(&self, model: &str) -> Result<&ModelConfig, GatewayError> {
        self.resolve(model).map(|(config, _)| config)
    }

    fn resolve(&self, model: &str) -> Result<(&ModelConfig, &ProviderClient), GatewayError> {
        let config = self
            .registry
            .get(model)
            .ok_or_else(|| GatewayError::UnsupportedModel {
                model: model.to_string(),
            })?;
        let client = self.providers.get(&config.provider).ok_or_else(|| {
            GatewayError::ProviderUnavailable {
                provider: config.provider,
                model: model.to_string(),
            }
        })?;
        Ok((config, client))
    }

    pub async fn analyze_request(
        &self,
        request: &AnalyzeRequest,
    ) -> Result<CallResult, GatewayError> {
        self.analyze(
            &request.prompt,
            &request.model,
            request.temperature,
            &request.extra_params,
        )
        .await
    }
}

fn parse_response(provider: Provider, raw: &str) -> Result<CallResult, GatewayError> {
    serde_json::from_str(strip_code_fence(raw))
        .map_err(|source| GatewayError::ResponseParse { provider, source })
}

/// Models sometimes wrap JSON in a Markdown fence despite instructions.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}
