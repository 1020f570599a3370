use async_trait::async_trait;
use openai_dive::v1::resources::chat::{ChatCompletionParameters, ChatCompletionResponse};

use crate::chat::{ChatClient, CompatHooks};
use crate::error::LlmError;
use crate::provider::{EnvVar, LlmProvider, LlmStream, ProviderInfo};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

/// Local Ollama server through its OpenAI compatible endpoint, no key needed
pub struct OllamaProvider {
    client: ChatClient,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>) -> Self {
        let url = base_url.unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
        Self {
            client: ChatClient::new(String::new(), url),
            model: OLLAMA_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Returns None unless OLLAMA_BASE_URL is set, so that a missing local
    /// server is never picked implicitly
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("OLLAMA_BASE_URL").ok()?;
        let provider = Self::new(Some(base_url));
        Some(match std::env::var("OLLAMA_MODEL") {
            Ok(model) => provider.with_model(model),
            Err(_) => provider,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, request: ChatCompletionParameters) -> Result<ChatCompletionResponse, LlmError> {
        self.client.chat_completion(&request, &CompatHooks).await
    }

    async fn chat_stream(&self, request: ChatCompletionParameters) -> Result<LlmStream, LlmError> {
        let stream = self.client.chat_completion_stream(&request, CompatHooks).await?;
        Ok(Box::new(stream))
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &'static str {
        "ollama"
    }

    fn info() -> ProviderInfo {
        ProviderInfo {
            name: "ollama",
            display_name: "Ollama",
            env_vars: vec![
                EnvVar::optional("OLLAMA_BASE_URL", "ollama base open ai compat url"),
                EnvVar::optional("OLLAMA_MODEL", "model pulled on the local server"),
            ],
        }
    }
}
