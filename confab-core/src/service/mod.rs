mod ai_service;
mod builder;
mod error;
mod moderation;
mod result;
mod router;
mod state;
mod structured;
mod system;
mod template;

pub use ai_service::{AiService, TurnInput, DEFAULT_MAX_TOOL_ROUNDS};
pub use builder::{AiServiceBuilder, DEFAULT_MAX_MESSAGES};
pub use error::ServiceError;
pub use moderation::BlocklistModeration;
pub use result::{ServiceEvent, ServiceResult, ServiceStream};
pub use router::{Router, RouterReply, DEFAULT_CANNED_REPLY};
pub use state::{TurnMachine, TurnState};
pub use structured::{decode, OutputShape};
pub use system::SystemMessageProvider;
pub use template::{PromptTemplate, TemplateError};
