//! Redis Cluster transport.
//!
//! `PUBLISH` in a Redis Cluster is forwarded to every node, so a subscriber
//! attached to any single node sees all traffic. Each new subscription starts
//! from the node after the one used last time, so a dead node is skipped on
//! resubscribe.

use super::{ChannelTransport, PayloadStream};
use crate::error::{TransportError, TransportResult};
use crate::pool::redact_url;
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncCommands, Client};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

/// Redis Pub/Sub transport for a Redis Cluster
pub struct RedisClusterTransport {
    /// Cluster client used for `PUBLISH`
    cluster: ClusterClient,
    /// Lazily established cluster connection
    connection: OnceCell<ClusterConnection>,
    /// One plain client per node for subscriptions
    nodes: Vec<(String, Client)>,
    /// Index of the node to try first on the next subscribe
    next_node: AtomicUsize,
}

impl RedisClusterTransport {
    /// Create a new transport from the cluster's startup node URLs
    pub fn new(node_urls: Vec<String>) -> TransportResult<Self> {
        if node_urls.is_empty() {
            return Err(TransportError::NoClusterNodes);
        }

        let cluster = ClusterClient::new(node_urls.clone())?;
        let nodes = node_urls
            .into_iter()
            .map(|url| Client::open(url.as_str()).map(|client| (url, client)))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(nodes = nodes.len(), "Redis cluster transport created");

        Ok(Self {
            cluster,
            connection: OnceCell::new(),
            nodes,
            next_node: AtomicUsize::new(0),
        })
    }

    async fn connection(&self) -> TransportResult<ClusterConnection> {
        let conn = self
            .connection
            .get_or_try_init(|| async { self.cluster.get_async_connection().await })
            .await?;
        Ok(conn.clone())
    }

    /// Node order for the next subscription attempt
    fn rotation(&self) -> impl Iterator<Item = usize> + '_ {
        let start = self.next_node.fetch_add(1, Ordering::Relaxed);
        let count = self.nodes.len();
        (0..count).map(move |offset| (start + offset) % count)
    }
}

#[async_trait]
impl ChannelTransport for RedisClusterTransport {
    async fn publish(&self, topic: &str, payload: &str) -> TransportResult<u32> {
        let mut conn = self.connection().await?;
        let receivers: u32 = conn.publish(topic, payload).await?;

        tracing::debug!(topic = %topic, receivers = receivers, "Published payload to cluster");

        Ok(receivers)
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<PayloadStream> {
        let mut last_error = TransportError::NoClusterNodes;

        for index in self.rotation() {
            let (url, client) = &self.nodes[index];

            let attempt = async {
                let mut pubsub = client.get_async_pubsub().await?;
                pubsub.subscribe(topic).await?;
                Ok::<_, redis::RedisError>(pubsub)
            };

            match attempt.await {
                Ok(pubsub) => {
                    tracing::info!(
                        topic = %topic,
                        node = %redact_url(url),
                        "Subscribed to Redis cluster channel"
                    );

                    return Ok(pubsub
                        .into_on_message()
                        .map(|msg| msg.get_payload::<String>().map_err(Into::into))
                        .boxed());
                }
                Err(e) => {
                    tracing::warn!(
                        node = %redact_url(url),
                        error = %e,
                        "Cluster node rejected subscription, trying next"
                    );
                    last_error = e.into();
                }
            }
        }

        Err(last_error)
    }

    fn backend(&self) -> &'static str {
        "redis-cluster"
    }
}

impl std::fmt::Debug for RedisClusterTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClusterTransport")
            .field("nodes", &self.nodes.len())
            .field("connected", &self.connection.initialized())
            .finish()
    }
}
