mod engine_config;
pub mod error;

pub use engine_config::{EngineConfig, RawEngineConfig};
pub use error::ConfigError;
