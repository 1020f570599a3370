use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("Response decode error: {0}")]
    Decode(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Errors worth retrying the whole turn for
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(_) | LlmError::Timeout(_) | LlmError::Stream(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Decode(_) | LlmError::Configuration(_) => false,
        }
    }

    pub(crate) fn from_status(status: u16, message: String) -> Self {
        LlmError::Api { status, message }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            LlmError::Transport(format!("timeout: {}", error))
        } else if error.is_decode() {
            LlmError::Decode(error.to_string())
        } else {
            LlmError::Transport(error.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(error: serde_json::Error) -> Self {
        LlmError::Decode(error.to_string())
    }
}
