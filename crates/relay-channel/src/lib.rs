//! # relay-channel
//!
//! Publish/subscribe transports that carry the shared chat channel between
//! relay instances.
//!
//! ## Backends
//!
//! - **Redis**: a single node; publishes through a deadpool connection pool and
//!   subscribes on a dedicated pub/sub connection
//! - **Redis Cluster**: publishes through the cluster client and subscribes on
//!   any node, since `PUBLISH` is propagated to the whole cluster
//! - **Memory**: an in-process bus for single-instance deployments and tests
//!
//! ## Example
//!
//! ```ignore
//! use relay_channel::{ChannelTransport, MemoryTransport};
//! use futures_util::StreamExt;
//!
//! let transport = MemoryTransport::new(64);
//! let mut payloads = transport.subscribe("chat_channel").await?;
//! transport.publish("chat_channel", r#"{"sender_id":"u1","content":"hi"}"#).await?;
//! let first = payloads.next().await;
//! ```

pub mod error;
pub mod pool;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use pool::{RedisPool, RedisPoolConfig};
pub use transport::{
    create_transport, ChannelTransport, MemoryTransport, PayloadStream, RedisClusterTransport,
    RedisTransport, SharedTransport,
};
