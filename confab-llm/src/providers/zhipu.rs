// Zhipu GLM through its OpenAI compatible endpoint
use async_trait::async_trait;
use openai_dive::v1::resources::chat::{ChatCompletionParameters, ChatCompletionResponse};

use crate::chat::{ChatClient, CompatHooks};
use crate::error::LlmError;
use crate::provider::{EnvVar, LlmProvider, LlmStream, ProviderInfo};

const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
const ZHIPU_DEFAULT_MODEL: &str = "glm-4-flash";

pub struct ZhipuProvider {
    client: ChatClient,
    model: String,
}

impl ZhipuProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: ChatClient::new(api_key, ZHIPU_BASE_URL.to_string()),
            model: ZHIPU_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("ZHIPU_API_KEY").ok().map(Self::new)
    }
}

#[async_trait]
impl LlmProvider for ZhipuProvider {
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
        "zhipu"
    }

    fn info() -> ProviderInfo {
        ProviderInfo {
            name: "zhipu",
            display_name: "Zhipu GLM",
            env_vars: vec![EnvVar::required("ZHIPU_API_KEY", "Zhipu open platform API key")],
        }
    }
}
