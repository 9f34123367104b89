//! Channel publisher
//!
//! Encodes [`ChatMessage`]s and publishes them on the configured topic. Shared
//! by the inbound path and the lifecycle controller so user messages and
//! departure notices take the same route.

use relay_channel::{SharedTransport, TransportError};
use relay_core::{ChatMessage, CodecError};
use std::sync::Arc;

/// Failure to get a message onto the channel
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Publish failed: {0}")]
    Transport(#[from] TransportError),
}

/// Publishes messages on the shared channel topic
#[derive(Clone)]
pub struct ChannelPublisher {
    transport: SharedTransport,
    topic: Arc<str>,
}

impl ChannelPublisher {
    /// Create a publisher for a topic
    pub fn new(transport: SharedTransport, topic: impl Into<Arc<str>>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    /// Get the topic name
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a message, returning the number of channel subscribers reached
    pub async fn publish(&self, message: &ChatMessage) -> Result<u32, PublishError> {
        let payload = message.to_json()?;
        let receivers = self.transport.publish(&self.topic, &payload).await?;

        tracing::trace!(
            topic = %self.topic,
            sender_id = %message.sender_id,
            receivers = receivers,
            "Message published"
        );

        Ok(receivers)
    }
}

impl std::fmt::Debug for ChannelPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPublisher")
            .field("topic", &self.topic)
            .field("backend", &self.transport.backend())
            .finish()
    }
}
