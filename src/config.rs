use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::gateway::{
    Credentials, DEFAULT_MODEL, GatewaySettings, ModelConfig, ModelRegistry, Provider, RetryPolicy,
};

pub const CONFIG_ENV: &str = "CHATLENS_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config file '{}': {message}", .path.display())]
    Invalid { path: PathBuf, message: String },
    #[error("Cannot resolve config path: set CHATLENS_CONFIG or HOME/XDG_CONFIG_HOME.")]
    NoConfigPath,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProvidersSection {
    pub openai: Option<ProviderSection>,
    pub anthropic: Option<ProviderSection>,
}

impl ProvidersSection {
    pub fn get(&self, provider: Provider) -> Option<&ProviderSection> {
        match provider {
            Provider::OpenAi => self.openai.as_ref(),
            Provider::Anthropic => self.anthropic.as_ref(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = (Provider, &ProviderSection)> {
        Provider::ALL
            .into_iter()
            .filter_map(move |provider| self.get(provider).map(|section| (provider, section)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    pub provider: Provider,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub default_model: Option<String>,
    /// Request timeout in seconds.
    pub timeout: Option<u64>,
    pub max_attempts: Option<u32>,
    /// Base retry delay in milliseconds.
    pub retry_delay: Option<u64>,
    #[serde(default)]
    pub providers: ProvidersSection,
    #[serde(default)]
    pub models: HashMap<String, ModelSection>,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub path: Option<PathBuf>,
    pub file: ConfigFile,
}

impl AppConfig {
    /// Loads the config from `explicit`, `CHATLENS_CONFIG`, or the XDG/HOME
    /// default location. Only a missing file at the default location is
    /// tolerated; a named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        if let Some(path) = env_config_path() {
            return Self::from_path(&path);
        }

        let path = default_config_path()?;
        if !path.exists() {
            return Ok(Self {
                path: None,
                file: ConfigFile::default(),
            });
        }
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file = parse_config(path, &raw)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            file,
        })
    }

    pub fn default_model(&self) -> &str {
        self.file.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Keys from the config file win over `*_API_KEY` environment variables.
    pub fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::from_env();
        for (provider, section) in self.file.providers.iter() {
            if let Some(api_key) = section.api_key.as_deref().filter(|key| !key.trim().is_empty())
            {
                credentials.set(provider, api_key);
            }
        }
        credentials
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        let defaults = RetryPolicy::default();
        let mut registry = ModelRegistry::builtin();
        for (name, section) in &self.file.models {
            let mut model = ModelConfig::new(name.clone(), section.provider);
            model.default_params = section.params.clone();
            registry = registry.with_model(model);
        }

        let mut settings = GatewaySettings::default().with_retry(RetryPolicy {
            max_attempts: self.file.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay_ms: self.file.retry_delay.unwrap_or(defaults.base_delay_ms),
        });
        settings.registry = registry;
        settings.timeout_secs = self.file.timeout;
        for (provider, section) in self.file.providers.iter() {
            if let Some(base_url) = &section.base_url {
                settings = settings.with_base_url(provider, base_url.clone());
            }
        }
        settings
    }
}

fn parse_config(path: &Path, raw: &str) -> Result<ConfigFile, ConfigError> {
    let file: ConfigFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |message: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    };
    if file.max_attempts == Some(0) {
        return Err(invalid("max_attempts must be at least 1".to_string()));
    }
    if file.timeout == Some(0) {
        return Err(invalid("timeout must be greater than 0".to_string()));
    }
    for (provider, section) in file.providers.iter() {
        if let Some(base_url) = &section.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(invalid(format!(
                    "providers.{provider}.base_url must start with http:// or https://"
                )));
            }
        }
    }
    if let Some(model) = &file.default_model {
        let known =
            ModelRegistry::builtin().get(model).is_some() || file.models.contains_key(model);
        if !known {
            return Err(invalid(format!(
                "default_model '{model}' is not a registered model"
            )));
        }
    }

    Ok(file)
}

fn env_config_path() -> Option<PathBuf> {
    env::var(CONFIG_ENV)
        .ok()
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed).join("chatlens").join("config.toml"));
        }
    }

    let home = env::var("HOME").map_err(|_| ConfigError::NoConfigPath)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("chatlens")
        .join("config.toml"))
}
