//! Gateway state
//!
//! Application state for the gateway server.

use crate::broadcast::OutboundDispatcher;
use crate::handlers::InboundPath;
use crate::lifecycle::LifecycleController;
use relay_common::RelaySettings;
use std::sync::Arc;
use tokio::sync::watch;

/// Gateway application state
///
/// Holds all shared dependencies for the WebSocket handler.
#[derive(Clone)]
pub struct GatewayState {
    /// Registers and tears down connections
    lifecycle: LifecycleController,
    /// Client-to-channel path shared by every reader
    inbound: InboundPath,
    /// Channel-to-client path
    dispatcher: Arc<OutboundDispatcher>,
    /// Relay tunables
    settings: Arc<RelaySettings>,
    /// Process shutdown flag
    shutdown: watch::Receiver<bool>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(
        lifecycle: LifecycleController,
        inbound: InboundPath,
        dispatcher: Arc<OutboundDispatcher>,
        settings: RelaySettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            lifecycle,
            inbound,
            dispatcher,
            settings: Arc::new(settings),
            shutdown,
        }
    }

    /// Get the lifecycle controller
    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    /// Get the inbound path
    pub fn inbound(&self) -> &InboundPath {
        &self.inbound
    }

    /// Get the outbound dispatcher
    pub fn dispatcher(&self) -> &Arc<OutboundDispatcher> {
        &self.dispatcher
    }

    /// Get the relay settings
    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Get a fresh handle on the shutdown flag
    pub fn shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", self.lifecycle.registry())
            .field("dispatcher", &self.dispatcher)
            .field("settings", &self.settings)
            .finish()
    }
}
