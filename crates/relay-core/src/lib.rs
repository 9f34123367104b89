//! # relay-core
//!
//! Domain layer for the chat relay: the message that travels over the shared
//! channel, its wire encoding, and the text rendered to clients.
//! This crate has zero dependencies on infrastructure (Redis, web framework, etc.).

pub mod entities;
pub mod error;

// Re-export commonly used types at crate root
pub use entities::{
    ChatMessage, DEFAULT_IDENTITY, DEFAULT_TOPIC, DEPARTURE_NOTICE, SYSTEM_SENDER,
};
pub use error::CodecError;
