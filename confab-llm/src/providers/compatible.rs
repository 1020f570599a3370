// Any server speaking the OpenAI chat-completions dialect: Zhipu GLM, vLLM, LM Studio...
use async_trait::async_trait;
use openai_dive::v1::resources::chat::{ChatCompletionParameters, ChatCompletionResponse};

use crate::chat::{ChatClient, CompatHooks};
use crate::error::LlmError;
use crate::provider::{EnvVar, LlmProvider, LlmStream, ProviderInfo};

pub struct OpenAiCompatibleProvider {
    client: ChatClient,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: ChatClient::new(api_key, base_url),
            model,
        }
    }

    /// Create OpenAI Compatible provider from environment variables
    /// Returns None if required environment variables are not set
    pub fn from_env() -> Option<Self> {
        match (
            std::env::var("OPENAI_COMPATIBLE_API_KEY"),
            std::env::var("OPENAI_COMPATIBLE_BASE_URL"),
        ) {
            (Ok(api_key), Ok(base_url)) => {
                let model = std::env::var("OPENAI_COMPATIBLE_MODEL").unwrap_or_default();
                Some(Self::new(api_key, base_url, model))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
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
        "openai_compatible"
    }

    fn info() -> ProviderInfo {
        ProviderInfo {
            name: "openai_compatible",
            display_name: "OpenAI Compatible API",
            env_vars: vec![
                EnvVar::required("OPENAI_COMPATIBLE_API_KEY", "API key for OpenAI-compatible service"),
                EnvVar::required("OPENAI_COMPATIBLE_BASE_URL", "Base URL for OpenAI-compatible service"),
                EnvVar::optional("OPENAI_COMPATIBLE_MODEL", "Model served by the endpoint"),
            ],
        }
    }
}
