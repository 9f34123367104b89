//! Relay configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use relay_core::{DEFAULT_IDENTITY, DEFAULT_TOPIC};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub channel: ChannelConfig,
    pub redis: RedisConfig,
    pub relay: RelaySettings,
    pub reconnect: ReconnectConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Listen address for the gateway
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which publish/subscribe backend carries the shared channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelBackend {
    /// A single Redis node
    #[default]
    Redis,
    /// A Redis Cluster
    Cluster,
    /// In-process bus, no cross-instance fan-out
    Memory,
}

impl ChannelBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "redis" => Some(Self::Redis),
            "cluster" => Some(Self::Cluster),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Shared channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub backend: ChannelBackend,
    pub topic: String,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Node URLs for the cluster backend
    pub cluster_nodes: Vec<String>,
    pub max_connections: u32,
}

/// Per-connection relay behaviour
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub default_identity: String,
    pub send_timeout_ms: u64,
    pub max_frame_bytes: usize,
    pub outbound_buffer: usize,
}

impl RelaySettings {
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            default_identity: default_identity(),
            send_timeout_ms: default_send_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

/// Resubscription backoff for the channel subscriber
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl ReconnectConfig {
    /// Delay before the given (1-based) consecutive retry, without jitter
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay_ms(),
            max_delay_ms: default_reconnect_max_delay_ms(),
            max_attempts: default_reconnect_max_attempts(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-relay".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_string()
}

fn default_send_timeout_ms() -> u64 {
    2_000
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_outbound_buffer() -> usize {
    100
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_reconnect_max_attempts() -> u32 {
    10
}

impl RelayConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable holds an unparsable value, or if the
    /// cluster backend is selected without any cluster nodes.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: match lookup("APP_ENV") {
                    Some(value) => Environment::parse(&value)
                        .ok_or(ConfigError::InvalidValue("APP_ENV", value))?,
                    None => default_env(),
                },
            },
            gateway: ServerConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parse_var(&lookup, "GATEWAY_PORT")?.unwrap_or_else(default_port),
            },
            channel: ChannelConfig {
                backend: match lookup("CHANNEL_BACKEND") {
                    Some(value) => ChannelBackend::parse(&value)
                        .ok_or(ConfigError::InvalidValue("CHANNEL_BACKEND", value))?,
                    None => ChannelBackend::default(),
                },
                topic: lookup("RELAY_TOPIC")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(default_topic),
            },
            redis: RedisConfig {
                url: lookup("REDIS_URL").unwrap_or_else(default_redis_url),
                cluster_nodes: lookup("REDIS_CLUSTER_NODES")
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|n| !n.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
                max_connections: parse_var(&lookup, "REDIS_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_redis_max_connections),
            },
            relay: RelaySettings {
                default_identity: lookup("RELAY_DEFAULT_IDENTITY")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(default_identity),
                send_timeout_ms: parse_var(&lookup, "RELAY_SEND_TIMEOUT_MS")?
                    .unwrap_or_else(default_send_timeout_ms),
                max_frame_bytes: parse_var(&lookup, "RELAY_MAX_FRAME_BYTES")?
                    .unwrap_or_else(default_max_frame_bytes),
                outbound_buffer: parse_var(&lookup, "RELAY_OUTBOUND_BUFFER")?
                    .unwrap_or_else(default_outbound_buffer),
            },
            reconnect: ReconnectConfig {
                delay_ms: parse_var(&lookup, "RELAY_RECONNECT_DELAY_MS")?
                    .unwrap_or_else(default_reconnect_delay_ms),
                max_delay_ms: parse_var(&lookup, "RELAY_RECONNECT_MAX_DELAY_MS")?
                    .unwrap_or_else(default_reconnect_max_delay_ms),
                max_attempts: parse_var(&lookup, "RELAY_RECONNECT_MAX_ATTEMPTS")?
                    .unwrap_or_else(default_reconnect_max_attempts),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.backend == ChannelBackend::Cluster && self.redis.cluster_nodes.is_empty() {
            return Err(ConfigError::MissingVar("REDIS_CLUSTER_NODES"));
        }
        if self.relay.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_OUTBOUND_BUFFER",
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
