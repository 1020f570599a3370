use std::fmt::Debug;
use async_trait::async_trait;
use futures::Stream;
use openai_dive::v1::resources::chat::{ChatCompletionChunkResponse, ChatCompletionParameters, ChatCompletionResponse};

use crate::error::LlmError;

pub type LlmStream = Box<dyn Stream<Item = Result<ChatCompletionChunkResponse, LlmError>> + Send + Unpin>;

#[derive(Debug, Clone)]
pub struct EnvVar {
    pub name: String,
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub env_vars: Vec<EnvVar>,
}

impl EnvVar {
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: false,
        }
    }
}

/// Provider seam: speaks the OpenAI chat-completions shape. Anything that
/// differs per vendor is handled behind this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: ChatCompletionParameters) -> Result<ChatCompletionResponse, LlmError>;

    async fn chat_stream(&self, request: ChatCompletionParameters) -> Result<LlmStream, LlmError>;

    /// Model used when the caller does not name one
    fn default_model(&self) -> &str;

    fn name(&self) -> &'static str;

    /// Returns provider information including environment variables
    fn info() -> ProviderInfo where Self: Sized;
}

impl Debug for dyn LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LlmProvider({})", self.name())
    }
}
