pub mod config;
pub mod logging;
pub mod memory;
pub mod service;
pub mod tools;

pub use config::{ConfabConfig, ConfigError, ProviderConfig};
pub use logging::LoggingConfig;
pub use memory::{MemoryError, MemoryStore};
pub use service::{AiService, AiServiceBuilder, ServiceError, ServiceEvent, ServiceResult, TurnInput};
