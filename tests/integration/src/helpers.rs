//! Test helpers for integration tests
//!
//! Provides utilities for spawning a gateway on an ephemeral port and driving
//! it with WebSocket clients.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use relay_channel::{MemoryTransport, SharedTransport};
use relay_common::{RelayConfig, RelayResult};
use relay_gateway::connection::ConnectionRegistry;
use relay_gateway::Gateway;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long a client waits for an expected frame
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a relay configuration for tests
///
/// Uses the in-memory backend and short timeouts; `overrides` take precedence.
pub fn test_config(overrides: &[(&str, &str)]) -> Result<RelayConfig> {
    let mut vars: HashMap<String, String> = [
        ("CHANNEL_BACKEND", "memory"),
        ("GATEWAY_HOST", "127.0.0.1"),
        ("GATEWAY_PORT", "0"),
        ("RELAY_SEND_TIMEOUT_MS", "500"),
        ("RELAY_RECONNECT_DELAY_MS", "10"),
        ("RELAY_RECONNECT_MAX_DELAY_MS", "50"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }

    Ok(RelayConfig::from_lookup(|key| vars.get(key).cloned())?)
}

/// Check that a Redis server is configured for tests that need one
pub fn redis_url() -> Option<String> {
    let _ = dotenvy::dotenv();
    match std::env::var("REDIS_URL") {
        Ok(url) if !url.is_empty() => Some(url),
        _ => {
            eprintln!("Skipping test: REDIS_URL not set");
            None
        }
    }
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub topic: String,
    registry: Arc<ConnectionRegistry>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<RelayResult<()>>,
}

impl TestServer {
    /// Start a gateway on the in-memory transport
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config(&[])?).await
    }

    /// Start a gateway on the in-memory transport with custom config
    pub async fn start_with_config(config: RelayConfig) -> Result<Self> {
        Self::start_with_transport(config, Arc::new(MemoryTransport::default())).await
    }

    /// Start a gateway on an arbitrary transport
    pub async fn start_with_transport(
        config: RelayConfig,
        transport: SharedTransport,
    ) -> Result<Self> {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let gateway = Gateway::start(&config, transport, shutdown_rx).await?;
        let registry = gateway.state().lifecycle().registry().clone();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(gateway.serve(listener));

        Ok(Self {
            addr,
            topic: config.channel.topic,
            registry,
            shutdown,
            handle,
        })
    }

    /// WebSocket URL, optionally carrying a `user_id`
    pub fn ws_url(&self, user_id: Option<&str>) -> String {
        match user_id {
            Some(id) => format!("ws://{}/ws?user_id={}", self.addr, id),
            None => format!("ws://{}/ws", self.addr),
        }
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Connect with the default identity and wait until registered
    pub async fn connect(&self) -> Result<TestClient> {
        self.connect_url(self.ws_url(None)).await
    }

    /// Connect as `user_id` and wait until registered
    pub async fn connect_as(&self, user_id: &str) -> Result<TestClient> {
        self.connect_url(self.ws_url(Some(user_id))).await
    }

    async fn connect_url(&self, url: String) -> Result<TestClient> {
        let before = self.connection_count();
        let (stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("connecting to {url}"))?;
        self.wait_for_connections(before + 1).await?;
        Ok(TestClient { stream })
    }

    /// Wait until exactly `expected` connections are registered
    pub async fn wait_for_connections(&self, expected: usize) -> Result<()> {
        wait_until(RECV_TIMEOUT, || self.connection_count() == expected)
            .await
            .with_context(|| {
                format!(
                    "expected {expected} connections, have {}",
                    self.connection_count()
                )
            })
    }

    /// Rendered frame as clients receive it on this server's topic
    pub fn render(&self, content: &str, sender_id: &str) -> String {
        format!("Message from {}: {} by user {}", self.topic, content, sender_id)
    }

    /// Signal shutdown and wait for the server to stop
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        let result = tokio::time::timeout(RECV_TIMEOUT, self.handle)
            .await
            .context("server did not stop")??;
        Ok(result?)
    }
}

/// A WebSocket client connected to a [`TestServer`]
pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Send a text frame
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Receive the next text frame, skipping control frames
    pub async fn recv_text(&mut self) -> Result<String> {
        loop {
            let next = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for a frame")?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(other)) => bail!("unexpected frame: {other:?}"),
                Some(Err(e)) => return Err(e.into()),
                None => bail!("connection closed"),
            }
        }
    }

    /// Assert no text frame arrives within `window`
    pub async fn expect_silence(&mut self, window: Duration) -> Result<()> {
        match tokio::time::timeout(window, self.stream.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Text(text)))) => bail!("unexpected frame: {text}"),
            Ok(other) => bail!("unexpected event: {other:?}"),
        }
    }

    /// Send a close frame and wait for the server to finish the handshake
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        while let Ok(Some(Ok(_))) = tokio::time::timeout(RECV_TIMEOUT, self.stream.next()).await {}
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, condition: F) -> Result<()>
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
