//! Domain entities

mod message;

pub use message::{ChatMessage, DEFAULT_IDENTITY, DEFAULT_TOPIC, DEPARTURE_NOTICE, SYSTEM_SENDER};
