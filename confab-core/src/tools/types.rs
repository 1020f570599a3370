use std::collections::HashMap;
use async_trait::async_trait;
use confab_llm::{Message, ToolCallRequest, ToolDescription};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outcome of a tool call, both variants go back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success {
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<HashMap<String, Value>>,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<HashMap<String, Value>>,
    },
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        ToolResult::Success { output: output.into(), metadata: None }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ToolResult::Error { error: error.into(), metadata: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    /// Text the model sees
    pub fn text(&self) -> &str {
        match self {
            ToolResult::Success { output, .. } => output,
            ToolResult::Error { error, .. } => error,
        }
    }

    /// The tool result message answering `call_id`
    pub fn to_message(&self, call_id: &str) -> Message {
        match self {
            ToolResult::Success { output, .. } => Message::tool_result(call_id, output.clone()),
            ToolResult::Error { error, .. } => Message::tool_error(call_id, error.clone()),
        }
    }
}

/// Tool failures. The first two are conversational: they become error results
/// the model can react to instead of aborting the turn.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("tool `{0}` not found")]
    ToolNotFound(String),
    #[error("invalid arguments for tool `{name}`: {reason}")]
    ToolArgumentDecode { name: String, reason: String },
    #[error("a tool named `{0}` is already registered")]
    DuplicateTool(String),
}

impl From<ToolError> for ToolResult {
    fn from(error: ToolError) -> Self {
        ToolResult::error(error.to_string())
    }
}

/// A tool with typed parameters, usually implemented through `#[tool]`
#[async_trait]
pub trait Tool: ToolDescription {
    type Params: DeserializeOwned + JsonSchema + Send;

    async fn execute(&self, params: Self::Params) -> ToolResult;
}

/// Object safe view of a tool: takes raw JSON arguments
#[async_trait]
pub trait AnyTool: ToolDescription {
    async fn execute_json(&self, arguments: Value) -> ToolResult;
}

#[async_trait]
impl<T: Tool> AnyTool for T {
    async fn execute_json(&self, arguments: Value) -> ToolResult {
        // models send `null` or nothing for parameterless tools
        let arguments = if arguments.is_null() { Value::Object(Default::default()) } else { arguments };
        match serde_json::from_value::<T::Params>(arguments) {
            Ok(params) => self.execute(params).await,
            Err(e) => ToolError::ToolArgumentDecode {
                name: self.name().to_string(),
                reason: e.to_string(),
            }
            .into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ToolEmptyParams {}

/// A tool call of a turn together with what it returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub request: ToolCallRequest,
    pub result: ToolResult,
    pub duration_ms: u64,
}
