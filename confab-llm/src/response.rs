use std::ops::AddAssign;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::message::{Message, ToolCallRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Why a model turn ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    /// Map the provider's wire tag (`stop`, `tool_calls`, `length`, `content_filter`, ...)
    pub fn from_wire(tag: &str) -> Self {
        match tag {
            "stop" | "end_turn" | "stop_sequence" => FinishReason::Stop,
            "tool_calls" | "function_call" | "tool_use" => FinishReason::ToolCalls,
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// Reference to a retrieved document backing an answer. Retrieval is not
/// performed by this crate, the field exists so the response shape is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A finished model turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// always a `Message::Assistant`
    pub message: Message,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    #[serde(default)]
    pub model: String,
    /// content extracted from `<think>` blocks, if the model emitted any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ChatResponse {
    pub fn new(message: Message, usage: TokenUsage, finish_reason: FinishReason) -> Self {
        Self {
            message,
            usage,
            finish_reason,
            sources: vec![],
            model: String::new(),
            reasoning: None,
        }
    }

    pub fn text(&self) -> String {
        self.message.text()
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        self.message.tool_calls()
    }

    /// True when the model is waiting for tool results before it can answer
    pub fn requests_tools(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls || self.message.has_tool_calls()
    }
}

/// Events emitted by a streaming model call. A stream yields any number of
/// `Partial` events followed by exactly one `Complete` or `Error`.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Partial(String),
    Complete(ChatResponse),
    Error(LlmError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Partial(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates_and_saturates() {
        let mut usage = TokenUsage::new(10, 2);
        usage += TokenUsage::new(5, 3);
        assert_eq!(usage, TokenUsage { prompt_tokens: 15, completion_tokens: 5, total_tokens: 20 });

        assert_eq!(TokenUsage::new(u32::MAX, 1).total_tokens, u32::MAX);
        usage += TokenUsage { prompt_tokens: u32::MAX, completion_tokens: 1, total_tokens: u32::MAX };
        assert_eq!(usage, TokenUsage { prompt_tokens: u32::MAX, completion_tokens: 6, total_tokens: u32::MAX });
    }
}
