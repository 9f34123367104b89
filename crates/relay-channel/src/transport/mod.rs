//! Channel transports.
//!
//! One publish/subscribe capability with interchangeable backends. The relay
//! logic only ever sees [`ChannelTransport`].

mod cluster;
mod memory;
mod standalone;

pub use cluster::RedisClusterTransport;
pub use memory::MemoryTransport;
pub use standalone::RedisTransport;

use crate::error::TransportResult;
use crate::pool::RedisPoolConfig;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use relay_common::{ChannelBackend, RelayConfig};
use std::sync::Arc;

/// Buffer size for the in-memory bus
const MEMORY_BUFFER: usize = 1024;

/// Stream of raw payloads received on a subscribed topic
///
/// The stream ends when the underlying subscription is lost; an `Err` item
/// reports a single undecodable delivery and does not end the stream.
pub type PayloadStream = BoxStream<'static, TransportResult<String>>;

/// Publish/subscribe capability backing the shared channel
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Publish a payload, returning how many subscribers received it
    async fn publish(&self, topic: &str, payload: &str) -> TransportResult<u32>;

    /// Subscribe to a topic
    ///
    /// Returns once the subscription is established.
    async fn subscribe(&self, topic: &str) -> TransportResult<PayloadStream>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

/// Shared transport handle
pub type SharedTransport = Arc<dyn ChannelTransport>;

/// Build the transport selected by configuration
pub fn create_transport(config: &RelayConfig) -> TransportResult<SharedTransport> {
    let transport: SharedTransport = match config.channel.backend {
        ChannelBackend::Redis => Arc::new(RedisTransport::new(&RedisPoolConfig::from(
            &config.redis,
        ))?),
        ChannelBackend::Cluster => {
            Arc::new(RedisClusterTransport::new(config.redis.cluster_nodes.clone())?)
        }
        ChannelBackend::Memory => Arc::new(MemoryTransport::new(MEMORY_BUFFER)),
    };

    tracing::info!(backend = transport.backend(), "Channel transport created");

    Ok(transport)
}
