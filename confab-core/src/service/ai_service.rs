use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use confab_llm::{
    ChatResponse, GenerationParams, LlmError, Message, ModelClient, ModelRequest, ModerationModel, ResponseFormat,
    StreamEvent, TokenUsage,
};
use futures::StreamExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::memory::MemoryStore;
use crate::tools::{ToolDispatcher, ToolExecution};
use super::error::ServiceError;
use super::result::{ServiceEvent, ServiceResult, ServiceStream};
use super::state::{TurnMachine, TurnState};
use super::structured::{self, OutputShape};
use super::system::SystemMessageProvider;
use super::template::PromptTemplate;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

/// What the caller says in one turn
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub text: String,
    /// image urls sent along with the text
    pub images: Vec<String>,
    /// values for the system and user templates
    pub variables: HashMap<String, String>,
}

impl TurnInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

impl From<&str> for TurnInput {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for TurnInput {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

pub(crate) struct ServiceInner {
    pub(crate) model: Arc<dyn ModelClient>,
    pub(crate) memory: Arc<MemoryStore>,
    pub(crate) tools: Arc<ToolDispatcher>,
    pub(crate) moderation: Option<Arc<dyn ModerationModel>>,
    pub(crate) system_message: Option<Arc<dyn SystemMessageProvider>>,
    pub(crate) user_template: Option<PromptTemplate>,
    pub(crate) params: GenerationParams,
    pub(crate) max_tool_rounds: usize,
    pub(crate) timeout: Option<Duration>,
}

/// Memory, model and tools behind a conversation-id keyed contract.
/// Cheap to clone, clones share everything.
#[derive(Clone)]
pub struct AiService {
    inner: Arc<ServiceInner>,
}

type EventSink = mpsc::UnboundedSender<ServiceEvent>;

enum StreamStep<T> {
    Event(ServiceEvent),
    Finished(T),
}

impl AiService {
    pub(crate) fn from_inner(inner: ServiceInner) -> Self {
        Self { inner: Arc::new(inner) }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.inner.memory
    }

    pub fn tools(&self) -> &ToolDispatcher {
        &self.inner.tools
    }

    pub fn params(&self) -> &GenerationParams {
        &self.inner.params
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.inner.max_tool_rounds
    }

    pub async fn converse(&self, id: &str, input: impl Into<TurnInput>) -> Result<ServiceResult, ServiceError> {
        self.converse_with(id, input.into(), CancellationToken::new()).await
    }

    pub async fn converse_with(
        &self,
        id: &str,
        input: TurnInput,
        cancel: CancellationToken,
    ) -> Result<ServiceResult, ServiceError> {
        let (result, _) = self.run_turn(id, input, None, cancel, None, |_| Ok(())).await?;
        Ok(result)
    }

    /// Ask for a typed answer. The expected format is appended to the user
    /// text and the answer is decoded before anything is committed.
    pub async fn converse_as<T>(&self, id: &str, input: impl Into<TurnInput>) -> Result<T, ServiceError>
    where
        T: DeserializeOwned + JsonSchema + Send,
    {
        let mut input = input.into();
        let shape = OutputShape::of::<T>();
        input.text = shape.apply(&input.text);
        let (_, value) = self
            .run_turn(id, input, shape.response_format, CancellationToken::new(), None, |response| {
                structured::decode::<T>(&response.text())
            })
            .await?;
        Ok(value)
    }

    pub fn converse_streaming(&self, id: &str, input: impl Into<TurnInput>) -> ServiceStream {
        self.converse_streaming_with(id, input.into(), CancellationToken::new())
    }

    /// Partial text as it arrives, then exactly one `Complete` or `Error`.
    /// Dropping the stream drops the in-flight turn.
    pub fn converse_streaming_with(&self, id: &str, input: TurnInput, cancel: CancellationToken) -> ServiceStream {
        let service = self.clone();
        let id = id.to_string();
        Box::pin(async_stream::stream! {
            let (sink, mut events) = mpsc::unbounded_channel();
            let turn = service.run_turn(&id, input, None, cancel, Some(sink), |_| Ok(()));
            tokio::pin!(turn);

            let outcome = loop {
                let step = tokio::select! {
                    biased;
                    Some(event) = events.recv() => StreamStep::Event(event),
                    outcome = &mut turn => StreamStep::Finished(outcome),
                };
                match step {
                    StreamStep::Event(event) => yield event,
                    StreamStep::Finished(outcome) => break outcome,
                }
            };
            while let Ok(event) = events.try_recv() {
                yield event;
            }
            yield match outcome {
                Ok((result, _)) => ServiceEvent::Complete(result),
                Err(e) => ServiceEvent::Error(e),
            };
        })
    }

    /// One full turn. Memory gets the user message up front and the
    /// assistant/tool messages only once the turn succeeded.
    async fn run_turn<R, F>(
        &self,
        id: &str,
        input: TurnInput,
        response_format: Option<ResponseFormat>,
        cancel: CancellationToken,
        sink: Option<EventSink>,
        finish: F,
    ) -> Result<(ServiceResult, R), ServiceError>
    where
        R: Send,
        F: FnOnce(&ChatResponse) -> Result<R, ServiceError> + Send,
    {
        let _turn = self.inner.memory.lock_turn(id).await;
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let mut machine = TurnMachine::new(id);
        info!(target: "service::turn", id, text_len = input.text.len(), images = input.images.len(), "turn started");

        let user_text = match &self.inner.user_template {
            Some(template) => template.render_it(&input.text, &input.variables)?,
            None => input.text.clone(),
        };

        if let Some(moderation) = &self.inner.moderation {
            machine.transition(TurnState::ModerationCheck)?;
            let verdict = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
                verdict = moderation.moderate(&user_text) => verdict?,
            };
            if verdict.flagged {
                warn!(target: "service::turn", id, categories = ?verdict.categories, "input flagged by moderation");
                return Err(ServiceError::ModerationViolation { categories: verdict.categories });
            }
        }

        self.prepare_memory(id, &input, &user_text).await?;

        let mut params = self.inner.params.clone();
        if let Some(format) = response_format {
            params.response_format = format;
        }
        let descriptors = self.inner.tools.descriptors();

        let mut pending: Vec<Message> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut executions: Vec<ToolExecution> = Vec::new();
        let mut round = 0;

        loop {
            machine.transition(TurnState::ModelCall { round })?;
            let mut messages = self.inner.memory.history(id).await?;
            messages.extend(pending.iter().cloned());
            let request = ModelRequest::new(params.clone(), messages).with_tools(descriptors.clone());

            let response = self.call_model(request, &cancel, sink.as_ref()).await?;
            usage += response.usage;

            let calls = response.tool_calls().to_vec();
            if response.requests_tools() && !calls.is_empty() {
                if round >= self.inner.max_tool_rounds {
                    warn!(target: "service::turn", id, rounds = round, "tool loop exceeded");
                    return Err(ServiceError::ToolLoopExceeded(self.inner.max_tool_rounds));
                }
                round += 1;
                machine.transition(TurnState::ToolExecution { round, calls: calls.len() })?;
                pending.push(response.message.clone());

                let round_executions = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
                    executions = self.inner.tools.dispatch_all(&calls) => executions,
                };
                for execution in round_executions {
                    pending.push(execution.result.to_message(&execution.request.id));
                    if let Some(sink) = &sink {
                        let _ = sink.send(ServiceEvent::ToolExecuted(execution.clone()));
                    }
                    executions.push(execution);
                }
                continue;
            }

            let value = finish(&response)?;
            machine.transition(TurnState::Done)?;
            pending.push(response.message.clone());
            self.inner.memory.append_all(id, pending).await?;

            info!(target: "service::turn", id, rounds = round, tools = executions.len(), total_tokens = usage.total_tokens, "turn done");
            let result = ServiceResult {
                finish_reason: response.finish_reason.clone(),
                sources: response.sources.clone(),
                response,
                usage,
                tool_executions: executions,
                rounds: round,
            };
            return Ok((result, value));
        }
    }

    /// Pin the system message and store the user message, unless this is a
    /// retry of a turn whose user message is already the last one stored
    async fn prepare_memory(&self, id: &str, input: &TurnInput, user_text: &str) -> Result<(), ServiceError> {
        let memory = &self.inner.memory;
        let history = memory.history(id).await?;

        if let Some(provider) = &self.inner.system_message {
            if let Some(system) = provider.system_message(id) {
                let system = PromptTemplate::new(system).render(&input.variables)?;
                let current = history.first().filter(|m| m.is_system()).map(Message::text);
                if current.as_deref() != Some(system.as_str()) {
                    memory.set_system(id, system).await?;
                }
            }
        }

        let user_message = if input.images.is_empty() {
            Message::user(user_text)
        } else {
            Message::user_with_images(user_text, &input.images)
        };
        if history.last() == Some(&user_message) {
            debug!(target: "service::turn", id, "retrying turn, user message already stored");
        } else {
            memory.append(id, user_message).await?;
        }
        Ok(())
    }

    async fn call_model(
        &self,
        request: ModelRequest,
        cancel: &CancellationToken,
        sink: Option<&EventSink>,
    ) -> Result<ChatResponse, ServiceError> {
        let model = self.inner.model.clone();
        let call = async move {
            let Some(sink) = sink else {
                return model.send(request).await.map_err(ServiceError::from);
            };
            let mut stream = model.send_streaming(request).await;
            while let Some(event) = stream.next().await {
                match event {
                    StreamEvent::Partial(text) => {
                        let _ = sink.send(ServiceEvent::Partial(text));
                    }
                    StreamEvent::Complete(response) => return Ok(response),
                    StreamEvent::Error(e) => return Err(ServiceError::from(e)),
                }
            }
            Err(ServiceError::Transport(LlmError::Stream("stream ended without a terminal event".to_string())))
        };

        match self.inner.timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ServiceError::Cancelled),
                outcome = tokio::time::timeout(limit, call) => match outcome {
                    Ok(result) => result,
                    Err(_) => Err(ServiceError::Transport(LlmError::Timeout(limit))),
                },
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ServiceError::Cancelled),
                result = call => result,
            },
        }
    }
}
