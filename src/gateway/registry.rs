use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::gateway::provider::Provider;

pub const DEFAULT_MODEL: &str = "gpt-4";

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    pub provider: Provider,
    pub default_params: Map<String, Value>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            default_params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_params.insert(key.into(), value);
        self
    }
}

/// Immutable lookup table from logical model name to provider and defaults.
///
/// Built once at startup and handed to the gateway; names are unique, so each
/// model resolves to exactly one provider.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, ModelConfig>,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        Self::empty()
            .with_model(
                ModelConfig::new("gpt-4", Provider::OpenAi)
                    .with_param("response_format", json!({ "type": "json_object" })),
            )
            .with_model(
                ModelConfig::new("claude-3-sonnet", Provider::Anthropic)
                    .with_param("max_tokens", json!(1024)),
            )
    }

    /// Registers `config`, replacing any earlier entry with the same name.
    pub fn with_model(mut self, config: ModelConfig) -> Self {
        self.models.insert(config.name.clone(), config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Builds the request parameters for one call: `temperature` first, then the
/// model defaults, then caller extras. Later sources win on key collision.
pub fn merge_params(
    temperature: f64,
    defaults: &Map<String, Value>,
    extra: &Map<String, Value>,
) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("temperature".to_string(), json!(temperature));
    for (key, value) in defaults.iter().chain(extra.iter()) {
        params.insert(key.clone(), value.clone());
    }
    params
}
