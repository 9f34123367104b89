//! Client frame handlers
//!
//! Everything a connection's reader does with the frames a client sends.

mod error;
mod inbound;

pub use error::{HandlerError, HandlerResult};
pub use inbound::InboundPath;
