#[allow(clippy::module_inception)]
pub mod config;

pub use config::{ConfabConfig, ConfigError, ProviderConfig};

#[cfg(test)]
mod tests;
