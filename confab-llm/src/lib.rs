pub mod chat;
pub mod client;
pub mod error;
pub mod message;
pub mod model;
pub mod moderation;
pub mod provider;
pub mod providers;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;
mod wire;

pub use client::LlmClient;
pub use error::LlmError;
pub use message::{Content, ContentPart, Message, Role, ToolCallRequest};
pub use model::{ChatStream, ModelClient};
pub use moderation::{Moderation, ModerationModel, OpenAiModerationModel};
pub use provider::{EnvVar, LlmProvider, LlmStream, ProviderInfo};
pub use request::{GenerationParams, ModelRequest, ResponseFormat};
pub use response::{ChatResponse, FinishReason, SourceRef, StreamEvent, TokenUsage};
pub use tool::{parameters_schema_for, ToolDescription, ToolDescriptor};
