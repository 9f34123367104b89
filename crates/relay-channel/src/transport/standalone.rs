//! Single-node Redis transport.

use super::{ChannelTransport, PayloadStream};
use crate::error::TransportResult;
use crate::pool::{RedisPool, RedisPoolConfig};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::Client;

/// Redis Pub/Sub transport for a single node
#[derive(Debug, Clone)]
pub struct RedisTransport {
    /// Pool used for `PUBLISH`
    pool: RedisPool,
    /// Client used to open dedicated subscriber connections
    client: Client,
}

impl RedisTransport {
    /// Create a new transport; no connection is opened until first use
    pub fn new(config: &RedisPoolConfig) -> TransportResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let pool = RedisPool::new(config)?;

        Ok(Self { pool, client })
    }

    /// Get the publish pool
    #[must_use]
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }
}

#[async_trait]
impl ChannelTransport for RedisTransport {
    async fn publish(&self, topic: &str, payload: &str) -> TransportResult<u32> {
        let receivers = self.pool.publish(topic, payload).await?;

        tracing::debug!(topic = %topic, receivers = receivers, "Published payload");

        Ok(receivers)
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<PayloadStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;

        tracing::info!(
            topic = %topic,
            node = %self.client.get_connection_info().addr,
            "Subscribed to Redis channel"
        );

        Ok(pubsub
            .into_on_message()
            .map(|msg| msg.get_payload::<String>().map_err(Into::into))
            .boxed())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
