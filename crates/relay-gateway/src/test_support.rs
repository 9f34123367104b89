//! Shared fixtures for unit tests.

use async_trait::async_trait;
use relay_channel::{ChannelTransport, PayloadStream, TransportError, TransportResult};
use std::sync::atomic::{AtomicU32, Ordering};

/// Transport whose every operation fails as if the backend were down
#[derive(Debug, Default)]
pub(crate) struct FailingTransport {
    publish_attempts: AtomicU32,
    subscribe_attempts: AtomicU32,
    misconfigured: bool,
}

impl FailingTransport {
    /// Fail with an error that retrying cannot fix
    pub(crate) fn misconfigured() -> Self {
        Self {
            misconfigured: true,
            ..Self::default()
        }
    }

    fn error(&self) -> TransportError {
        if self.misconfigured {
            TransportError::CreatePool("invalid redis url".to_string())
        } else {
            TransportError::ChannelClosed
        }
    }

    pub(crate) fn publish_attempts(&self) -> u32 {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe_attempts(&self) -> u32 {
        self.subscribe_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelTransport for FailingTransport {
    async fn publish(&self, _topic: &str, _payload: &str) -> TransportResult<u32> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error())
    }

    async fn subscribe(&self, _topic: &str) -> TransportResult<PayloadStream> {
        self.subscribe_attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error())
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}
