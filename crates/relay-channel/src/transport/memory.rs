//! In-memory transport for single-instance deployments and tests.

use super::{ChannelTransport, PayloadStream};
use crate::error::TransportResult;
use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// In-process pub/sub bus
///
/// Payloads published to a topic with no subscribers are dropped, like Redis.
#[derive(Debug)]
pub struct MemoryTransport {
    /// Topic to broadcast sender
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
    /// Buffer size for each topic
    buffer_size: usize,
}

impl MemoryTransport {
    /// Create a new bus
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Drop a topic, ending every open subscription on it
    ///
    /// Simulates the loss of the backing connection.
    pub fn close_topic(&self, topic: &str) -> bool {
        self.topics.lock().remove(topic).is_some()
    }

    /// Number of live subscriptions on a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl ChannelTransport for MemoryTransport {
    async fn publish(&self, topic: &str, payload: &str) -> TransportResult<u32> {
        let receivers = self
            .topics
            .lock()
            .get(topic)
            .and_then(|tx| tx.send(payload.to_string()).ok())
            .unwrap_or(0);

        tracing::trace!(topic = %topic, receivers = receivers, "Published payload in memory");

        Ok(u32::try_from(receivers).unwrap_or(u32::MAX))
    }

    async fn subscribe(&self, topic: &str) -> TransportResult<PayloadStream> {
        let rx = self
            .topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe();

        let topic = topic.to_string();
        let stream = futures_util::stream::unfold(rx, move |mut rx| {
            let topic = topic.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(payload) => return Some((Ok(payload), rx)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                topic = %topic,
                                skipped = skipped,
                                "In-memory subscriber lagged behind"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
