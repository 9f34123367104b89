//! # relay-gateway
//!
//! WebSocket gateway that relays a shared pub/sub channel to every connected
//! client. Text a client sends is published on the channel as that client's
//! identity; everything that arrives on the channel is rendered and pushed to
//! all open connections.

pub mod broadcast;
pub mod connection;
pub mod handlers;
pub mod lifecycle;
pub mod server;

#[cfg(test)]
mod test_support;

pub use server::{create_app, create_router, run, Gateway, GatewayState};
