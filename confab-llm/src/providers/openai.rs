// OpenAI provider using the chat client with JSON hooks
use async_trait::async_trait;
use openai_dive::v1::resources::chat::{ChatCompletionParameters, ChatCompletionResponse};
use serde_json::{json, Value};

use crate::chat::{ChatClient, JsonHooks};
use crate::error::LlmError;
use crate::provider::{EnvVar, LlmProvider, LlmStream, ProviderInfo};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Ask OpenAI to send token usage in the last streamed chunk
#[derive(Clone, Copy, Default)]
pub struct OpenAiHooks;

#[async_trait]
impl JsonHooks for OpenAiHooks {
    async fn before_send(&self, mut json: Value) -> Result<Value, LlmError> {
        if json.get("stream").and_then(Value::as_bool) == Some(true) {
            json["stream_options"] = json!({ "include_usage": true });
        }
        Ok(json)
    }
}

pub struct OpenAiProvider {
    client: ChatClient,
    hooks: OpenAiHooks,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: ChatClient::new(api_key, OPENAI_BASE_URL.to_string()),
            hooks: OpenAiHooks,
            model: OPENAI_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.client = ChatClient::new(self.client.api_key.clone(), base_url)
            .with_organization(self.client.organization.clone());
        self
    }

    /// Create OpenAI provider from environment variables
    /// Returns None if required environment variables are not set
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let mut provider = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            provider = provider.with_base_url(base_url);
        }
        provider.client = provider.client.with_organization(std::env::var("OPENAI_ORGANIZATION").ok());
        Some(provider)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: ChatCompletionParameters) -> Result<ChatCompletionResponse, LlmError> {
        self.client.chat_completion(&request, &self.hooks).await
    }

    async fn chat_stream(&self, request: ChatCompletionParameters) -> Result<LlmStream, LlmError> {
        let stream = self.client.chat_completion_stream(&request, self.hooks).await?;
        Ok(Box::new(stream))
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn info() -> ProviderInfo {
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI (GPT-4o, GPT-4.1)",
            env_vars: vec![
                EnvVar::required("OPENAI_API_KEY", "OpenAI API key"),
                EnvVar::optional("OPENAI_BASE_URL", "Override the API base url"),
                EnvVar::optional("OPENAI_ORGANIZATION", "Organization id sent with each request"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_requests_usage() {
        let json = OpenAiHooks.before_send(json!({ "model": "m", "stream": true })).await.unwrap();
        assert_eq!(json["stream_options"]["include_usage"], true);
    }

    #[tokio::test]
    async fn test_plain_request_untouched() {
        let json = OpenAiHooks.before_send(json!({ "model": "m" })).await.unwrap();
        assert!(json.get("stream_options").is_none());
    }
}
