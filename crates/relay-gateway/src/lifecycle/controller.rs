//! Lifecycle controller
//!
//! The only writer of the connection registry. A connection moves
//! `Open -> Closing -> Closed`, and the move out of `Open` happens once no
//! matter how many tasks notice the disconnect.

use crate::broadcast::ChannelPublisher;
use crate::connection::{Connection, ConnectionRegistry, RegistryError};
use relay_core::ChatMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The client sent a close frame
    ClientClosed,
    /// The socket stream ended without a close frame
    StreamEnded,
    /// Reading from the socket failed
    ReceiveError(String),
    /// Writing to the socket failed or stalled
    SendFailed,
    /// The process is shutting down
    Shutdown,
}

impl DisconnectCause {
    /// Short label for log fields
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::StreamEnded => "stream_ended",
            Self::ReceiveError(_) => "receive_error",
            Self::SendFailed => "send_failed",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReceiveError(e) => write!(f, "receive_error: {e}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Registers and deregisters connections
#[derive(Clone)]
pub struct LifecycleController {
    registry: Arc<ConnectionRegistry>,
    publisher: ChannelPublisher,
}

impl LifecycleController {
    /// Create a new controller
    pub fn new(registry: Arc<ConnectionRegistry>, publisher: ChannelPublisher) -> Self {
        Self {
            registry,
            publisher,
        }
    }

    /// Get the registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Create an open connection for an upgraded socket and register it
    pub fn on_accept(
        &self,
        identity: impl Into<String>,
        sender: mpsc::Sender<String>,
    ) -> Result<Arc<Connection>, RegistryError> {
        let connection = Connection::new(identity, sender);
        let result = self.registry.register(connection.clone());
        debug_assert!(result.is_ok(), "connection IDs are unique");
        result?;

        tracing::info!(
            connection_id = %connection.id(),
            identity = %connection.identity(),
            connections = self.registry.len(),
            "Connection accepted"
        );

        Ok(connection)
    }

    /// Tear down a connection and announce the departure
    ///
    /// Returns `false` without side effects if teardown already happened.
    pub async fn on_disconnect(&self, connection: &Connection, cause: DisconnectCause) -> bool {
        if !connection.begin_close() {
            tracing::trace!(
                connection_id = %connection.id(),
                cause = %cause,
                "Disconnect already handled"
            );
            return false;
        }

        self.registry.deregister(connection.id());
        connection.release();

        tracing::info!(
            connection_id = %connection.id(),
            identity = %connection.identity(),
            cause = %cause,
            age_ms = connection.age().as_millis() as u64,
            connections = self.registry.len(),
            "Connection closed"
        );

        if let Err(e) = self.publisher.publish(&ChatMessage::departure()).await {
            tracing::warn!(
                connection_id = %connection.id(),
                error = %e,
                "Failed to publish departure notice"
            );
        }

        true
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("registry", &self.registry)
            .field("publisher", &self.publisher)
            .finish()
    }
}
