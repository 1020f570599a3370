use std::pin::Pin;
use confab_llm::{ChatResponse, FinishReason, SourceRef, TokenUsage};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::tools::ToolExecution;
use super::error::ServiceError;

/// Outcome of a completed turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResult {
    /// last model answer, the one that ended the turn
    pub response: ChatResponse,
    /// summed over every model call of the turn
    pub usage: TokenUsage,
    pub tool_executions: Vec<ToolExecution>,
    pub finish_reason: FinishReason,
    pub sources: Vec<SourceRef>,
    /// number of tool rounds the turn went through
    pub rounds: usize,
}

impl ServiceResult {
    pub fn text(&self) -> String {
        self.response.text()
    }
}

/// Events of a streamed turn. Any number of `Partial` and `ToolExecuted`,
/// then one `Complete` or `Error`.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    Partial(String),
    ToolExecuted(ToolExecution),
    Complete(ServiceResult),
    Error(ServiceError),
}

impl ServiceEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceEvent::Complete(_) | ServiceEvent::Error(_))
    }
}

pub type ServiceStream = Pin<Box<dyn Stream<Item = ServiceEvent> + Send>>;
