//! Connection lifecycle
//!
//! Accepting connections into the registry, tearing them down exactly once,
//! and the process-wide shutdown signal.

mod controller;
mod shutdown;

pub use controller::{DisconnectCause, LifecycleController};
pub use shutdown::{shutdown_signal, wait_for_shutdown};
