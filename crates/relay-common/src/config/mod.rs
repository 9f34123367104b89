//! Configuration structs

mod relay_config;

pub use relay_config::{
    AppSettings, ChannelBackend, ChannelConfig, ConfigError, Environment, ReconnectConfig,
    RedisConfig, RelayConfig, RelaySettings, ServerConfig,
};
