//! # relay-common
//!
//! Shared utilities including configuration, error handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppSettings, ChannelBackend, ChannelConfig, ConfigError, Environment, ReconnectConfig,
    RedisConfig, RelayConfig, RelaySettings, ServerConfig,
};
pub use error::{RelayError, RelayResult};
pub use telemetry::{init_tracing, TracingConfig, TracingError};
