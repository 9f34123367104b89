//! Channel fan-out
//!
//! Publishing onto the shared channel and distributing what arrives on it to
//! every connected client.

mod dispatcher;
mod publisher;

pub use dispatcher::{BroadcastReport, DispatcherConfig, OutboundDispatcher};
pub use publisher::{ChannelPublisher, PublishError};
