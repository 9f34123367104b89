//! Integration test utilities for the relay
//!
//! This crate provides helpers for running end-to-end tests against the
//! WebSocket gateway over real sockets.

pub mod helpers;

pub use helpers::*;
