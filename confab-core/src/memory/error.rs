use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    #[error("memory store error: {0}")]
    Store(String),
    #[error("window must hold at least one message")]
    EmptyWindow,
}
