use std::sync::Arc;
use std::time::Duration;
use confab_llm::{GenerationParams, ModelClient, ModerationModel, ResponseFormat};

use crate::memory::MemoryStore;
use crate::tools::{AnyTool, ToolDispatcher};
use super::ai_service::{AiService, ServiceInner, DEFAULT_MAX_TOOL_ROUNDS};
use super::error::ServiceError;
use super::system::SystemMessageProvider;
use super::template::PromptTemplate;

pub const DEFAULT_MAX_MESSAGES: usize = 10;

/// Builder for AiService
pub struct AiServiceBuilder {
    model: Arc<dyn ModelClient>,
    memory: Option<Arc<MemoryStore>>,
    max_messages: usize,
    tools: Vec<Arc<dyn AnyTool>>,
    moderation: Option<Arc<dyn ModerationModel>>,
    system_message: Option<Arc<dyn SystemMessageProvider>>,
    user_template: Option<PromptTemplate>,
    params: GenerationParams,
    max_tool_rounds: usize,
    timeout: Option<Duration>,
}

impl AiServiceBuilder {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            memory: None,
            max_messages: DEFAULT_MAX_MESSAGES,
            tools: vec![],
            moderation: None,
            system_message: None,
            user_template: None,
            params: GenerationParams::new(""),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            timeout: None,
        }
    }
}

impl AiServiceBuilder {
    /// Share an existing store, `max_messages` is then ignored
    pub fn memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn tool<T: AnyTool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tools(mut self, tools: Vec<Arc<dyn AnyTool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn moderation(mut self, moderation: Arc<dyn ModerationModel>) -> Self {
        self.moderation = Some(moderation);
        self
    }

    /// Same system message for every conversation
    pub fn system_message(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.system_message_provider(move |_: &str| Some(text.clone()))
    }

    pub fn system_message_provider(mut self, provider: impl SystemMessageProvider + 'static) -> Self {
        self.system_message = Some(Arc::new(provider));
        self
    }

    /// Template wrapping the user text, the text is bound to `{{it}}`
    pub fn user_template(mut self, template: impl Into<PromptTemplate>) -> Self {
        self.user_template = Some(template.into());
        self
    }

    pub fn params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn model_name(mut self, model: impl Into<String>) -> Self {
        self.params.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.params.max_tokens = Some(max_tokens);
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.params.response_format = format;
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Deadline of each model call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<AiService, ServiceError> {
        if self.memory.is_none() && self.max_messages == 0 {
            return Err(ServiceError::Configuration("max_messages must be at least 1".to_string()));
        }
        if let Some(temperature) = self.params.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ServiceError::Configuration(format!("temperature {} outside of [0, 2]", temperature)));
            }
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ServiceError::Configuration("timeout must be positive".to_string()));
        }

        let mut dispatcher = ToolDispatcher::new();
        for tool in self.tools {
            dispatcher.register_arc(tool)?;
        }

        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(MemoryStore::new(self.max_messages)));

        Ok(AiService::from_inner(ServiceInner {
            model: self.model,
            memory,
            tools: Arc::new(dispatcher),
            moderation: self.moderation,
            system_message: self.system_message,
            user_template: self.user_template,
            params: self.params,
            max_tool_rounds: self.max_tool_rounds,
            timeout: self.timeout,
        }))
    }
}
