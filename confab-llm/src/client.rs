use std::collections::HashMap;
use std::sync::LazyLock;
use async_trait::async_trait;
use openai_dive::v1::resources::chat::{ChatCompletionParameters, ChatCompletionResponse, ChatMessage, ChatMessageContent};
use regex::Regex;
use tracing::debug;

use crate::error::LlmError;
use crate::model::{ChatStream, ModelClient};
use crate::provider::{LlmProvider, LlmStream, ProviderInfo};
use crate::providers::{
    compatible::OpenAiCompatibleProvider,
    ollama::{OllamaProvider, OLLAMA_BASE_URL},
    openai::OpenAiProvider,
    zhipu::ZhipuProvider,
};
use crate::request::ModelRequest;
use crate::response::ChatResponse;
use crate::{stream, wire};

#[derive(Debug)]
pub struct LlmClient {
    provider: Box<dyn LlmProvider>,
    model: Option<String>,
}

/// Provider Factory related method
impl LlmClient {
    pub fn from_provider(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider, model: None }
    }

    /// Create an OpenAI provider from environment variables
    /// Returns None if required environment variables are not set
    pub fn from_env_openai() -> Option<Self> {
        OpenAiProvider::from_env().map(|provider| Self::from_provider(Box::new(provider)))
    }

    /// Create an OpenAI Compatible provider from environment variables
    /// Returns None if required environment variables are not set
    pub fn from_env_openai_compatible() -> Option<Self> {
        OpenAiCompatibleProvider::from_env().map(|provider| Self::from_provider(Box::new(provider)))
    }

    pub fn from_env_zhipu() -> Option<Self> {
        ZhipuProvider::from_env().map(|provider| Self::from_provider(Box::new(provider)))
    }

    /// Create an Ollama provider from environment variables
    pub fn from_env_ollama() -> Option<Self> {
        OllamaProvider::from_env().map(|provider| Self::from_provider(Box::new(provider)))
    }

    pub fn openai(api_key: String) -> Self {
        Self::from_provider(Box::new(OpenAiProvider::new(api_key)))
    }

    pub fn compatible(api_key: String, base_url: String, model: String) -> Self {
        Self::from_provider(Box::new(OpenAiCompatibleProvider::new(api_key, base_url, model)))
    }

    pub fn zhipu(api_key: String) -> Self {
        Self::from_provider(Box::new(ZhipuProvider::new(api_key)))
    }

    pub fn ollama(base_url: String) -> Self {
        Self::from_provider(Box::new(OllamaProvider::new(Some(base_url))))
    }

    /// Pick a provider from the environment. `CONFAB_PROVIDER` wins when set,
    /// otherwise the first provider whose variables are present.
    pub fn first_from_env() -> Option<Self> {
        if let Ok(provider) = std::env::var("CONFAB_PROVIDER") {
            match provider.as_str() {
                "openai" => return Self::from_env_openai(),
                "zhipu" => return Self::from_env_zhipu(),
                "openai_compatible" => return Self::from_env_openai_compatible(),
                "ollama" => return Self::from_env_ollama(),
                _ => {} // Fall through to default behavior
            }
        }

        Self::from_env_openai()
            .or_else(Self::from_env_zhipu)
            .or_else(Self::from_env_openai_compatible)
            .or_else(Self::from_env_ollama)
    }

    /// Get information about all available providers
    pub fn list_providers() -> Vec<ProviderInfo> {
        vec![
            OpenAiProvider::info(),
            ZhipuProvider::info(),
            OpenAiCompatibleProvider::info(),
            OllamaProvider::info(),
        ]
    }

    /// Create a provider dynamically based on name and environment values
    pub fn create_provider(provider_name: &str, env_values: &HashMap<String, String>) -> Result<Self, LlmError> {
        let get = |key: &str| {
            env_values
                .get(key)
                .cloned()
                .ok_or_else(|| LlmError::Configuration(format!("{} not found", key)))
        };

        match provider_name {
            "openai" => {
                let mut provider = OpenAiProvider::new(get("OPENAI_API_KEY")?);
                if let Some(base_url) = env_values.get("OPENAI_BASE_URL") {
                    provider = provider.with_base_url(base_url.clone());
                }
                Ok(Self::from_provider(Box::new(provider)))
            }
            "zhipu" => Ok(Self::zhipu(get("ZHIPU_API_KEY")?)),
            "openai_compatible" => Ok(Self::compatible(
                get("OPENAI_COMPATIBLE_API_KEY")?,
                get("OPENAI_COMPATIBLE_BASE_URL")?,
                env_values.get("OPENAI_COMPATIBLE_MODEL").cloned().unwrap_or_default(),
            )),
            "ollama" => {
                let base_url = env_values
                    .get("OLLAMA_BASE_URL")
                    .cloned()
                    .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
                let provider = OllamaProvider::new(Some(base_url));
                let provider = match env_values.get("OLLAMA_MODEL") {
                    Some(model) => provider.with_model(model.clone()),
                    None => provider,
                };
                Ok(Self::from_provider(Box::new(provider)))
            }
            _ => Err(LlmError::Configuration(format!("Unknown provider: {}", provider_name))),
        }
    }
}

/// Provider Delegate
impl LlmClient {
    /// Override the provider's default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = if model.is_empty() { None } else { Some(model) };
        self
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.provider.default_model())
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Get a reference to the underlying provider (for testing)
    pub fn provider(&self) -> &dyn LlmProvider {
        &*self.provider
    }
}

/// Higher level chat client
impl LlmClient {
    pub async fn chat(&self, request: ChatCompletionParameters) -> Result<ChatCompletionResponse, LlmError> {
        let response = self.provider.chat(request).await?.extract_think_content();
        Ok(response)
    }

    pub async fn chat_stream(&self, request: ChatCompletionParameters) -> Result<LlmStream, LlmError> {
        self.provider.chat_stream(request).await
    }

    fn parameters(&self, request: &ModelRequest) -> Result<ChatCompletionParameters, LlmError> {
        let mut params = wire::to_parameters(request)?;
        if params.model.is_empty() {
            params.model = self.model().to_string();
        }
        if params.model.is_empty() {
            return Err(LlmError::Configuration(format!(
                "no model configured for provider {}",
                self.provider_name()
            )));
        }
        Ok(params)
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    async fn send(&self, request: ModelRequest) -> Result<ChatResponse, LlmError> {
        let params = self.parameters(&request)?;
        debug!(target: "llm::request", provider = self.provider_name(), model = %params.model, tools = request.tools.len());
        let response = self.chat(params).await?;
        wire::from_completion(response)
    }

    async fn send_streaming(&self, request: ModelRequest) -> ChatStream {
        let params = match self.parameters(&request) {
            Ok(params) => params,
            Err(e) => return stream::failed(e),
        };
        debug!(target: "llm::request", provider = self.provider_name(), model = %params.model, stream = true);
        match self.chat_stream(params).await {
            Ok(chunks) => stream::into_events(chunks),
            Err(e) => stream::failed(e),
        }
    }

    fn default_model(&self) -> &str {
        self.model()
    }
}

static THINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").unwrap());

pub trait ExtractThinkContent {
    /// Extract <think> content from assistant messages and move it to reasoning_content
    fn extract_think_content(self) -> ChatCompletionResponse;
}

impl ExtractThinkContent for ChatCompletionResponse {
    fn extract_think_content(mut self) -> ChatCompletionResponse {
        for choice in &mut self.choices {
            if let ChatMessage::Assistant { reasoning_content, content, .. } = &mut choice.message {
                if let Some(ChatMessageContent::Text(content_text)) = content {
                    let reasoning = THINK
                        .captures(content_text)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().trim().to_string());
                    if let Some(reasoning) = reasoning {
                        *reasoning_content = Some(reasoning);
                        let cleaned = THINK.replace_all(content_text, "").trim().to_string();
                        *content = if cleaned.is_empty() { None } else { Some(ChatMessageContent::Text(cleaned)) };
                    }
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use futures::StreamExt;
    use serde_json::json;
    use crate::message::Message;
    use crate::request::GenerationParams;
    use crate::response::StreamEvent;

    /// Provider answering with a canned body and remembering the last request
    struct CannedProvider {
        body: serde_json::Value,
        seen: Arc<Mutex<Option<ChatCompletionParameters>>>,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn chat(&self, request: ChatCompletionParameters) -> Result<ChatCompletionResponse, LlmError> {
            *self.seen.lock().unwrap() = Some(request);
            Ok(serde_json::from_value(self.body.clone())?)
        }

        async fn chat_stream(&self, _request: ChatCompletionParameters) -> Result<LlmStream, LlmError> {
            Err(LlmError::Api { status: 503, message: "overloaded".to_string() })
        }

        fn default_model(&self) -> &str {
            "canned-model"
        }

        fn name(&self) -> &'static str {
            "canned"
        }

        fn info() -> ProviderInfo {
            ProviderInfo { name: "canned", display_name: "Canned", env_vars: vec![] }
        }
    }

    fn canned(content: &str) -> (LlmClient, Arc<Mutex<Option<ChatCompletionParameters>>>) {
        let seen = Arc::new(Mutex::new(None));
        let provider = CannedProvider {
            body: json!({
                "id": "1",
                "object": "chat.completion",
                "created": 1,
                "model": "canned-model",
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": content }, "finish_reason": "stop" }]
            }),
            seen: seen.clone(),
        };
        (LlmClient::from_provider(Box::new(provider)), seen)
    }

    #[tokio::test]
    async fn test_send_falls_back_to_default_model() {
        let (client, seen) = canned("hello");
        let response = client
            .send(ModelRequest::new(GenerationParams::new(""), vec![Message::user("hi")]))
            .await
            .unwrap();

        assert_eq!(response.text(), "hello");
        let request = seen.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "canned-model");
    }

    #[tokio::test]
    async fn test_model_override() {
        let (client, seen) = canned("hello");
        let client = client.with_model("other-model");
        client
            .send(ModelRequest::new(GenerationParams::new(""), vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().as_ref().unwrap().model, "other-model");
    }

    #[tokio::test]
    async fn test_think_block_moves_to_reasoning() {
        let (client, _) = canned("<think>the user greets me</think>Hello there");
        let response = client
            .send(ModelRequest::new(GenerationParams::new("m"), vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(response.text(), "Hello there");
        assert_eq!(response.reasoning.as_deref(), Some("the user greets me"));
    }

    #[tokio::test]
    async fn test_think_blocks_across_responses() {
        let (client, _) = canned("<think>\nstep one\n</think>Answer <think>aside</think>done");
        for _ in 0..2 {
            let response = client
                .send(ModelRequest::new(GenerationParams::new("m"), vec![Message::user("hi")]))
                .await
                .unwrap();
            assert_eq!(response.text(), "Answer done");
            assert_eq!(response.reasoning.as_deref(), Some("step one"));
        }

        let (client, _) = canned("<think>only thinking</think>");
        let response = client
            .send(ModelRequest::new(GenerationParams::new("m"), vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(response.text(), "");
        assert_eq!(response.reasoning.as_deref(), Some("only thinking"));
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_single_error_event() {
        let (client, _) = canned("unused");
        let events: Vec<StreamEvent> = client
            .send_streaming(ModelRequest::new(GenerationParams::new("m"), vec![Message::user("hi")]))
            .await
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(LlmError::Api { status: 503, .. })));
    }

    #[test]
    fn test_create_provider_by_name() {
        let env = HashMap::from([("ZHIPU_API_KEY".to_string(), "key".to_string())]);
        let client = LlmClient::create_provider("zhipu", &env).unwrap();
        assert_eq!(client.provider_name(), "zhipu");
        assert_eq!(client.model(), "glm-4-flash");

        let client = LlmClient::create_provider("ollama", &HashMap::new()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_provider_errors() {
        let missing = LlmClient::create_provider("openai", &HashMap::new());
        assert!(matches!(missing, Err(LlmError::Configuration(m)) if m.contains("OPENAI_API_KEY")));

        let unknown = LlmClient::create_provider("nope", &HashMap::new());
        assert!(matches!(unknown, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_list_providers() {
        let names: Vec<&str> = LlmClient::list_providers().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["openai", "zhipu", "openai_compatible", "ollama"]);
    }
}
