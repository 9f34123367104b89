//! Connection management
//!
//! Live WebSocket connections and the registry that owns them.

mod connection;
mod registry;

pub use connection::{Connection, ConnectionState, SendError};
pub use registry::{ConnectionRegistry, RegistryError};
