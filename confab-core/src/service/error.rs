use confab_llm::LlmError;
use thiserror::Error;

use crate::memory::MemoryError;
use crate::tools::ToolError;
use super::template::TemplateError;

#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] LlmError),
    #[error("input rejected by moderation ({})", categories.join(", "))]
    ModerationViolation { categories: Vec<String> },
    #[error("tool loop exceeded: the model still requested tools after {0} rounds")]
    ToolLoopExceeded(usize),
    #[error("could not decode structured response: {0}")]
    ResponseDecode(String),
    #[error("turn cancelled")]
    Cancelled,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("invalid turn state transition: {0}")]
    InvalidStateTransition(String),
}

impl ServiceError {
    /// Worth retrying the same turn
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Transport(e) => e.is_transient(),
            _ => false,
        }
    }
}
