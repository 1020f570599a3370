use std::collections::BTreeMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::ChatClient;
use crate::error::LlmError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODERATION_MODEL: &str = "omni-moderation-latest";

/// Verdict of a moderation model on one piece of text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Moderation {
    pub flagged: bool,
    /// names of the categories that triggered, empty when not flagged
    pub categories: Vec<String>,
}

impl Moderation {
    pub fn allowed() -> Self {
        Self::default()
    }

    pub fn flagged(categories: Vec<String>) -> Self {
        Self { flagged: true, categories }
    }
}

#[async_trait]
pub trait ModerationModel: Send + Sync {
    async fn moderate(&self, text: &str) -> Result<Moderation, LlmError>;
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: BTreeMap<String, bool>,
}

impl From<ModerationResponse> for Moderation {
    fn from(response: ModerationResponse) -> Self {
        let mut moderation = Moderation::allowed();
        for result in response.results {
            moderation.flagged |= result.flagged;
            moderation.categories.extend(
                result
                    .categories
                    .into_iter()
                    .filter(|(_, hit)| *hit)
                    .map(|(name, _)| name),
            );
        }
        moderation
    }
}

/// OpenAI `/moderations` endpoint
pub struct OpenAiModerationModel {
    client: ChatClient,
    model: String,
}

impl OpenAiModerationModel {
    pub fn new(api_key: String) -> Self {
        Self {
            client: ChatClient::new(api_key, OPENAI_BASE_URL.to_string()),
            model: OPENAI_MODERATION_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.client = ChatClient::new(self.client.api_key.clone(), base_url);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_env() -> Option<Self> {
        let model = Self::new(std::env::var("OPENAI_API_KEY").ok()?);
        Some(match std::env::var("OPENAI_BASE_URL") {
            Ok(base_url) => model.with_base_url(base_url),
            Err(_) => model,
        })
    }
}

#[async_trait]
impl ModerationModel for OpenAiModerationModel {
    async fn moderate(&self, text: &str) -> Result<Moderation, LlmError> {
        let request = ModerationRequest { model: &self.model, input: text };
        let response: ModerationResponse = self.client.post_json("/moderations", &request).await?;
        let moderation = Moderation::from(response);
        debug!(target: "llm::request", model = %self.model, flagged = moderation.flagged, categories = ?moderation.categories);
        Ok(moderation)
    }
}
