pub mod error;
pub mod store;
pub mod window;

pub use error::MemoryError;
pub use store::{ChatMemoryStore, InMemoryChatMemoryStore, MemoryHandle, MemoryStore};
pub use window::MemoryWindow;

#[cfg(test)]
mod tests;
