use async_trait::async_trait;

use crate::error::LlmError;
use crate::request::ModelRequest;
use crate::response::ChatResponse;
pub use crate::stream::ChatStream;

/// What the service layer talks to. Implementations never retry and never see
/// the conversation memory, they get the full history in each request.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn send(&self, request: ModelRequest) -> Result<ChatResponse, LlmError>;

    /// Stream of `Partial` events closed by exactly one `Complete` or `Error`
    async fn send_streaming(&self, request: ModelRequest) -> ChatStream;

    /// Model used when the request does not name one
    fn default_model(&self) -> &str;
}
