//! Pooled publish connections for single-node Redis.
//!
//! `PUBLISH` is a one-shot command, so it borrows a connection from a
//! deadpool-redis pool. A subscription holds its connection for its whole life
//! and never comes from here.

use crate::error::{TransportError, TransportResult};
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use std::time::Duration;

/// Longest a publisher waits for a free pooled connection
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Publish pool settings
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Upper bound on pooled connections
    pub max_size: usize,
    /// How long `publish` waits when every connection is busy
    pub wait_timeout: Duration,
}

impl RedisPoolConfig {
    /// Settings for `url` with the remaining fields at their defaults
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_size: 10,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl From<&relay_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &relay_common::RedisConfig) -> Self {
        Self {
            max_size: config.max_connections as usize,
            ..Self::new(config.url.as_str())
        }
    }
}

/// Pool of connections used for `PUBLISH`
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
    /// URL without credentials, for logs
    target: String,
}

impl RedisPool {
    /// Build the pool
    ///
    /// Connections are opened lazily, so this succeeds even when Redis is down.
    pub fn new(config: &RedisPoolConfig) -> TransportResult<Self> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| TransportError::CreatePool(e.to_string()))?
            .max_size(config.max_size)
            .wait_timeout(Some(config.wait_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| TransportError::CreatePool(e.to_string()))?;

        let target = redact_url(&config.url).to_string();
        tracing::debug!(target_addr = %target, max_size = config.max_size, "Publish pool ready");

        Ok(Self { pool, target })
    }

    /// Publish a payload on a pooled connection
    pub async fn publish(&self, topic: &str, payload: &str) -> TransportResult<u32> {
        let mut conn = self.pool.get().await?;
        Ok(conn.publish(topic, payload).await?)
    }

    /// Connections currently held by the pool
    #[must_use]
    pub fn size(&self) -> usize {
        self.pool.status().size
    }
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("target", &self.target)
            .field("size", &self.size())
            .finish()
    }
}

/// Strip credentials from a Redis URL before logging it
pub(crate) fn redact_url(url: &str) -> &str {
    url.rsplit('@').next().unwrap_or(url)
}
