//! Connection registry
//!
//! The authoritative set of live connections, backed by `DashMap` for
//! concurrent access.

use super::Connection;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry invariant violations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Connection already registered: {0}")]
    DuplicateConnection(String),
}

/// Set of live connections keyed by connection ID
///
/// Mutated only by the lifecycle controller. The outbound dispatcher reads it
/// through [`ConnectionRegistry::snapshot`], which copies out the handles so a
/// broadcast never iterates a live view.
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Create an empty registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Add a connection
    pub fn register(&self, connection: Arc<Connection>) -> Result<(), RegistryError> {
        match self.connections.entry(connection.id().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateConnection(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(connection_id = %connection.id(), "Connection registered");
                entry.insert(connection);
                Ok(())
            }
        }
    }

    /// Remove a connection, returning whether it was present
    pub fn deregister(&self, id: &str) -> bool {
        let removed = self.connections.remove(id).is_some();
        if removed {
            tracing::debug!(connection_id = %id, "Connection deregistered");
        }
        removed
    }

    /// Point-in-time copy of the open connections
    ///
    /// Connections with a recorded delivery failure are left out while their
    /// sessions tear them down.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .filter(|entry| entry.is_open() && !entry.has_failed())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Check if a connection is registered
    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// Get the number of registered connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no connections are registered
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connections.len())
            .finish()
    }
}
