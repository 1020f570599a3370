use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use confab_llm::{GenerationParams, LlmClient, LlmError, ResponseFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::service::{AiServiceBuilder, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TOOL_ROUNDS};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not find home directory")]
    NoHomeDirectory,
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("provider index {index} out of bounds (have {len} providers)")]
    ProviderIndex { index: usize, len: usize },
    #[error("cannot remove the last provider")]
    LastProvider,
    #[error("no provider configured")]
    NoProvider,
    #[error("failed to create {provider} client: {source}")]
    Client { provider: String, source: LlmError },
}

fn default_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    pub env_vars: HashMap<String, String>,
    /// empty means the provider's default model
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub response_format: ResponseFormat,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// per model call, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, env_vars: HashMap<String, String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            env_vars,
            model: model.into(),
            temperature: None,
            response_format: ResponseFormat::Text,
            max_messages: DEFAULT_MAX_MESSAGES,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            timeout_secs: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn client(&self) -> Result<LlmClient, ConfigError> {
        let client = LlmClient::create_provider(&self.provider, &self.env_vars)
            .map_err(|source| ConfigError::Client { provider: self.provider.clone(), source })?;
        Ok(client.with_model(self.model.clone()))
    }

    /// Builder for a service talking to this provider with these settings
    pub fn service_builder(&self) -> Result<AiServiceBuilder, ConfigError> {
        let client = self.client()?;
        let params = GenerationParams {
            model: client.model().to_string(),
            temperature: self.temperature,
            max_tokens: None,
            response_format: self.response_format.clone(),
        };
        let builder = AiServiceBuilder::new(Arc::new(client))
            .params(params)
            .max_messages(self.max_messages)
            .max_tool_rounds(self.max_tool_rounds);
        Ok(match self.timeout() {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfabConfig {
    pub providers: Vec<ProviderConfig>,
    pub selected_provider: usize,
}

impl ConfabConfig {
    pub fn add_provider(&mut self, provider: String, env_vars: HashMap<String, String>, model: String) -> usize {
        self.providers.push(ProviderConfig::new(provider, env_vars, model));
        self.providers.len() - 1
    }

    pub fn is_duplicate_config(&self, provider_name: &str, env_vars: &HashMap<String, String>, model: &str) -> bool {
        self.providers.iter().any(|provider_config| {
            provider_config.provider == provider_name && provider_config.env_vars == *env_vars && provider_config.model == model
        })
    }

    pub fn get_selected_provider(&self) -> Option<&ProviderConfig> {
        self.providers.get(self.selected_provider)
    }

    pub fn get_selected_provider_mut(&mut self) -> Option<&mut ProviderConfig> {
        self.providers.get_mut(self.selected_provider)
    }

    pub fn set_selected_provider(&mut self, index: usize) -> Result<(), ConfigError> {
        if index < self.providers.len() {
            self.selected_provider = index;
            Ok(())
        } else {
            Err(ConfigError::ProviderIndex { index, len: self.providers.len() })
        }
    }

    pub fn remove_provider(&mut self, index: usize) -> Result<ProviderConfig, ConfigError> {
        if index >= self.providers.len() {
            return Err(ConfigError::ProviderIndex { index, len: self.providers.len() });
        }
        if self.providers.len() == 1 {
            return Err(ConfigError::LastProvider);
        }

        let removed = self.providers.remove(index);
        if self.selected_provider >= self.providers.len() {
            self.selected_provider = self.providers.len() - 1;
        } else if self.selected_provider > index {
            self.selected_provider -= 1;
        }
        Ok(removed)
    }

    pub fn list_providers(&self) -> Vec<(usize, &str, &str)> {
        self.providers
            .iter()
            .enumerate()
            .map(|(i, config)| (i, config.provider.as_str(), config.model.as_str()))
            .collect()
    }

    pub fn find_providers_by_type(&self, provider_type: &str) -> Vec<usize> {
        self.providers
            .iter()
            .enumerate()
            .filter_map(|(i, config)| (config.provider == provider_type).then_some(i))
            .collect()
    }
}

/// Persistence
impl ConfabConfig {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(home.join(".confab.config"))
    }

    pub fn load() -> Result<ConfabConfig, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<ConfabConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: ConfabConfig = serde_json::from_str(&content)?;
        if config.selected_provider >= config.providers.len() {
            config.selected_provider = 0;
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!(target: "confab_core", path = %path.display(), providers = self.providers.len(), "config saved");
        Ok(())
    }

    pub fn exists() -> bool {
        Self::config_path().map(|path| path.exists()).unwrap_or(false)
    }
}

impl Default for ConfabConfig {
    fn default() -> Self {
        Self {
            // local ollama, no key needed
            providers: vec![ProviderConfig::new(
                "ollama",
                HashMap::from([(String::from("OLLAMA_BASE_URL"), String::from("http://localhost:11434/v1"))]),
                "llama3.2",
            )],
            selected_provider: 0,
        }
    }
}

impl ConfabConfig {
    /// Saved config (or the default one) with `CONFAB_PROVIDER` and
    /// `CONFAB_MODEL` applied on top
    pub fn from_env() -> Self {
        let config = Self::load().unwrap_or_default();
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(provider) = get("CONFAB_PROVIDER").filter(|p| !p.is_empty()) {
            let index = match self.find_providers_by_type(&provider).first() {
                Some(index) => *index,
                None => {
                    let env_vars = LlmClient::list_providers()
                        .into_iter()
                        .find(|info| info.name == provider)
                        .map(|info| {
                            info.env_vars
                                .iter()
                                .filter_map(|var| get(&var.name).map(|value| (var.name.clone(), value)))
                                .collect()
                        })
                        .unwrap_or_default();
                    self.add_provider(provider, env_vars, String::new())
                }
            };
            self.selected_provider = index;
        }
        if let Some(model) = get("CONFAB_MODEL").filter(|m| !m.is_empty()) {
            if let Some(selected) = self.get_selected_provider_mut() {
                selected.model = model;
            }
        }
        self
    }

    pub fn client(&self) -> Result<LlmClient, ConfigError> {
        self.get_selected_provider().ok_or(ConfigError::NoProvider)?.client()
    }

    pub fn service_builder(&self) -> Result<AiServiceBuilder, ConfigError> {
        self.get_selected_provider().ok_or(ConfigError::NoProvider)?.service_builder()
    }
}
