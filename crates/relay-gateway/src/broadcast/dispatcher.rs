//! Outbound dispatcher
//!
//! Holds the process's single channel subscription and fans every payload out
//! to the connections in the registry.

use crate::connection::ConnectionRegistry;
use crate::lifecycle::wait_for_shutdown;
use futures::future::join_all;
use futures_util::StreamExt;
use rand::Rng;
use relay_channel::{PayloadStream, SharedTransport};
use relay_common::{ReconnectConfig, RelayError, RelayResult};
use relay_core::ChatMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Configuration for the outbound dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Channel topic to subscribe to
    pub topic: String,
    /// Upper bound on handing one frame to one connection
    pub send_timeout: Duration,
    /// Resubscription backoff
    pub reconnect: ReconnectConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            topic: relay_core::DEFAULT_TOPIC.to_string(),
            send_timeout: Duration::from_secs(2),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections in the snapshot
    pub attempted: usize,
    /// Frames accepted by a connection's writer
    pub delivered: usize,
    /// Connections that were closed or timed out
    pub failed: usize,
}

/// Routes channel payloads to WebSocket connections
///
/// Only one dispatcher may subscribe per process; a second would deliver every
/// message twice.
pub struct OutboundDispatcher {
    config: DispatcherConfig,
    registry: Arc<ConnectionRegistry>,
    transport: SharedTransport,
    running: AtomicBool,
}

impl OutboundDispatcher {
    /// Create a new dispatcher
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<ConnectionRegistry>,
        transport: SharedTransport,
    ) -> Self {
        Self {
            config,
            registry,
            transport,
            running: AtomicBool::new(false),
        }
    }

    /// Subscribe to the channel and spawn the dispatch loop
    ///
    /// Returns only after the subscription is established, so connections
    /// accepted afterwards see every message published from then on. The task
    /// resolves to an error if the channel cannot be resubscribed.
    pub async fn start(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> RelayResult<JoinHandle<RelayResult<()>>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RelayError::Server(
                "outbound dispatcher is already running".to_string(),
            ));
        }

        let stream = match self.subscribe_with_backoff(&mut shutdown).await {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(RelayError::Server(
                    "shutdown requested before subscription".to_string(),
                ));
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        tracing::info!(
            topic = %self.config.topic,
            backend = self.transport.backend(),
            "Outbound dispatcher started"
        );

        let dispatcher = self.clone();
        Ok(tokio::spawn(async move {
            let result = dispatcher.run(stream, shutdown).await;
            dispatcher.running.store(false, Ordering::SeqCst);
            result
        }))
    }

    /// Check if the dispatch loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(
        &self,
        mut stream: PayloadStream,
        mut shutdown: watch::Receiver<bool>,
    ) -> RelayResult<()> {
        loop {
            tokio::select! {
                biased;

                () = wait_for_shutdown(&mut shutdown) => {
                    tracing::info!("Outbound dispatcher stopping");
                    return Ok(());
                }

                next = stream.next() => match next {
                    Some(Ok(payload)) => {
                        self.handle_payload(&payload).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Undecodable channel delivery, skipping");
                    }
                    None => {
                        tracing::warn!(topic = %self.config.topic, "Channel subscription lost");
                        match self.subscribe_with_backoff(&mut shutdown).await? {
                            Some(resubscribed) => stream = resubscribed,
                            None => return Ok(()),
                        }
                    }
                },
            }
        }
    }

    /// Subscribe, retrying with exponential backoff
    ///
    /// Only lost connections are retried; any other transport error gives up
    /// at once. `Ok(None)` means shutdown was requested while waiting.
    async fn subscribe_with_backoff(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> RelayResult<Option<PayloadStream>> {
        let reconnect = &self.config.reconnect;
        let mut attempt = 0;

        loop {
            match self.transport.subscribe(&self.config.topic).await {
                Ok(stream) => {
                    if attempt > 0 {
                        tracing::info!(attempts = attempt, "Channel resubscribed");
                    }
                    return Ok(Some(stream));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= reconnect.max_attempts || !e.is_connection_lost() {
                        tracing::error!(
                            attempts = attempt,
                            connection_lost = e.is_connection_lost(),
                            error = %e,
                            "Giving up on channel subscription"
                        );
                        return Err(RelayError::ChannelUnavailable { attempts: attempt });
                    }

                    let delay = with_jitter(reconnect.backoff(attempt));
                    tracing::warn!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Channel subscribe failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        () = wait_for_shutdown(shutdown) => return Ok(None),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Decode one channel payload and broadcast it
    ///
    /// Returns `None` if the payload was malformed and dropped.
    pub async fn handle_payload(&self, payload: &str) -> Option<BroadcastReport> {
        match ChatMessage::from_json(payload) {
            Ok(message) => Some(self.broadcast(&message).await),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    code = e.code(),
                    payload_len = payload.len(),
                    "Dropping malformed channel payload"
                );
                None
            }
        }
    }

    /// Deliver a message to every connection in a registry snapshot
    ///
    /// Sends run concurrently and each is bounded by the send timeout, so one
    /// stalled client cannot hold up the rest. A connection that fails or times
    /// out is marked failed, which wakes its session to tear it down and keeps
    /// it out of later snapshots. The registry itself is left to the lifecycle
    /// controller.
    pub async fn broadcast(&self, message: &ChatMessage) -> BroadcastReport {
        let connections = self.registry.snapshot();
        if connections.is_empty() {
            tracing::debug!("No connected clients to broadcast to");
            return BroadcastReport::default();
        }

        let frame = message.render(&self.config.topic);
        let timeout = self.config.send_timeout;

        let results = join_all(connections.iter().map(|connection| {
            let frame = frame.clone();
            async move { (connection, connection.send(frame, timeout).await) }
        }))
        .await;

        let mut report = BroadcastReport {
            attempted: connections.len(),
            ..BroadcastReport::default()
        };

        for (connection, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    if connection.mark_failed() {
                        tracing::warn!(
                            connection_id = %connection.id(),
                            error = %e,
                            "Broadcast send failed, disconnecting client"
                        );
                    }
                }
            }
        }

        tracing::debug!(
            sender_id = %message.sender_id,
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Message broadcast"
        );

        report
    }
}

impl std::fmt::Debug for OutboundDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundDispatcher")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 4;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}
