use tracing::info;

use super::ai_service::{AiService, TurnInput};
use super::error::ServiceError;
use super::result::ServiceResult;

pub const DEFAULT_CANNED_REPLY: &str = "Greetings from Miles of Smiles! How can I make your day better?";

#[derive(Debug, Clone)]
pub enum RouterReply {
    /// the classifier matched, no reply model was called
    Canned(String),
    Service(ServiceResult),
}

impl RouterReply {
    pub fn text(&self) -> String {
        match self {
            RouterReply::Canned(text) => text.clone(),
            RouterReply::Service(result) => result.text(),
        }
    }

    pub fn is_canned(&self) -> bool {
        matches!(self, RouterReply::Canned(_))
    }
}

/// Chains two services: a yes/no classifier and a fallback conversation.
/// When the classifier answers yes the canned reply is returned as is.
#[derive(Clone)]
pub struct Router {
    classifier: AiService,
    fallback: AiService,
    canned: String,
}

impl Router {
    pub fn new(classifier: AiService, fallback: AiService) -> Self {
        Self { classifier, fallback, canned: DEFAULT_CANNED_REPLY.to_string() }
    }

    pub fn with_canned_reply(mut self, reply: impl Into<String>) -> Self {
        self.canned = reply.into();
        self
    }

    pub async fn route(&self, id: &str, input: impl Into<TurnInput>) -> Result<RouterReply, ServiceError> {
        let input = input.into();
        // classifier turns stay out of the caller's conversation
        let classifier_id = format!("{}::classifier", id);
        let classified = self.classifier.converse_as::<bool>(&classifier_id, input.clone()).await;
        self.classifier.memory().clear(&classifier_id).await?;
        let matched = classified?;

        info!(target: "service::turn", id, matched, "routed");
        if matched {
            return Ok(RouterReply::Canned(self.canned.clone()));
        }
        Ok(RouterReply::Service(self.fallback.converse(id, input).await?))
    }
}
