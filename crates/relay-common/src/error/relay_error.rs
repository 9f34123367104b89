//! Relay error types
//!
//! Unified error handling for the relay binary and its top-level tasks.

use crate::config::ConfigError;

/// Relay-wide error type
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    // Channel transport errors
    #[error("Channel transport error: {0}")]
    Transport(String),

    #[error("Channel unavailable after {attempts} resubscribe attempts")]
    ChannelUnavailable { attempts: u32 },

    // Server errors
    #[error("Server error: {0}")]
    Server(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl RelayError {
    /// Get error code for log fields
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::ChannelUnavailable { .. } => "CHANNEL_UNAVAILABLE",
            Self::Server(_) => "SERVER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create a transport error from any displayable cause
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
