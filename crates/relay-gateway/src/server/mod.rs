//! Gateway server setup
//!
//! Wires the registry, both relay paths and the lifecycle controller together
//! and serves the WebSocket route.

mod handler;
mod state;

pub use handler::{gateway_handler, ConnectParams};
pub use state::GatewayState;

use crate::broadcast::{ChannelPublisher, DispatcherConfig, OutboundDispatcher};
use crate::connection::ConnectionRegistry;
use crate::handlers::InboundPath;
use crate::lifecycle::{shutdown_signal, wait_for_shutdown, LifecycleController};
use axum::{routing::get, Router};
use relay_channel::{create_transport, SharedTransport};
use relay_common::{RelayConfig, RelayError, RelayResult};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new().route("/ws", get(gateway_handler))
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A gateway whose channel subscription is live
///
/// Built by [`Gateway::start`]; nothing is accepted until [`Gateway::serve`].
pub struct Gateway {
    state: GatewayState,
    dispatcher: JoinHandle<RelayResult<()>>,
    shutdown: watch::Receiver<bool>,
}

impl Gateway {
    /// Build the gateway state and subscribe to the channel
    pub async fn start(
        config: &RelayConfig,
        transport: SharedTransport,
        shutdown: watch::Receiver<bool>,
    ) -> RelayResult<Self> {
        let registry = ConnectionRegistry::new_shared();
        let publisher = ChannelPublisher::new(transport.clone(), config.channel.topic.as_str());

        let dispatcher = Arc::new(OutboundDispatcher::new(
            DispatcherConfig {
                topic: config.channel.topic.clone(),
                send_timeout: config.relay.send_timeout(),
                reconnect: config.reconnect.clone(),
            },
            registry.clone(),
            transport,
        ));

        let handle = dispatcher.clone().start(shutdown.clone()).await?;

        let state = GatewayState::new(
            LifecycleController::new(registry, publisher.clone()),
            InboundPath::new(publisher, config.relay.max_frame_bytes),
            dispatcher,
            config.relay.clone(),
            shutdown.clone(),
        );

        Ok(Self {
            state,
            dispatcher: handle,
            shutdown,
        })
    }

    /// Get the gateway state
    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Serve WebSocket connections until shutdown or a fatal channel error
    pub async fn serve(self, listener: TcpListener) -> RelayResult<()> {
        let Self {
            state,
            mut dispatcher,
            shutdown,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Gateway listening on ws://{}/ws", addr);
        }

        let mut server_shutdown = shutdown.clone();
        let server = axum::serve(listener, create_app(state))
            .with_graceful_shutdown(async move { wait_for_shutdown(&mut server_shutdown).await })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                result.map_err(|e| RelayError::Server(e.to_string()))?;
                join_dispatcher(dispatcher).await
            }
            result = &mut dispatcher => {
                flatten(result)?;
                server.await.map_err(|e| RelayError::Server(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").field("state", &self.state).finish()
    }
}

async fn join_dispatcher(handle: JoinHandle<RelayResult<()>>) -> RelayResult<()> {
    flatten(handle.await)
}

fn flatten(result: Result<RelayResult<()>, tokio::task::JoinError>) -> RelayResult<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(RelayError::internal(e)),
    }
}

/// Run the complete gateway with configuration
///
/// Returns when Ctrl-C or SIGTERM is received, or with an error if the channel
/// becomes permanently unavailable.
pub async fn run(config: RelayConfig) -> RelayResult<()> {
    let transport = create_transport(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutting down gateway");
        let _ = shutdown_tx.send(true);
    });

    // Subscribe before accepting so no client misses a message
    let gateway = Gateway::start(&config, transport, shutdown_rx).await?;

    let addr = config.gateway.address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Server(format!("Failed to bind to {addr}: {e}")))?;

    gateway.serve(listener).await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_channel::MemoryTransport;

    fn config() -> RelayConfig {
        RelayConfig::from_lookup(|_| None).unwrap()
    }

    #[tokio::test]
    async fn test_start_subscribes_before_serving() {
        let transport = Arc::new(MemoryTransport::default());
        let config = config();
        let (_tx, rx) = watch::channel(false);

        let gateway = Gateway::start(&config, transport.clone(), rx).await.unwrap();

        assert!(gateway.state().dispatcher().is_running());
        assert_eq!(transport.subscriber_count(&config.channel.topic), 1);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let transport = Arc::new(MemoryTransport::default());
        let (tx, rx) = watch::channel(false);
        let gateway = Gateway::start(&config(), transport, rx)
            .await
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let server = tokio::spawn(gateway.serve(listener));
        tx.send(true).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_start_fails_when_channel_unavailable() {
        let mut config = config();
        config.reconnect.delay_ms = 1;
        config.reconnect.max_delay_ms = 1;
        config.reconnect.max_attempts = 2;
        let (_tx, rx) = watch::channel(false);

        let err = Gateway::start(
            &config,
            Arc::new(crate::test_support::FailingTransport::default()),
            rx,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RelayError::ChannelUnavailable { attempts: 2 }));
        assert_eq!(err.error_code(), "CHANNEL_UNAVAILABLE");
    }
}
