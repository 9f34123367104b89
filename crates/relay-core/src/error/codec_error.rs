//! Codec errors - failures encoding or decoding channel payloads

use thiserror::Error;

/// Errors raised while moving a [`ChatMessage`](crate::ChatMessage) across the channel
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed channel payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Missing sender identity")]
    MissingSender,
}

impl CodecError {
    /// Get error code for log fields
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "MALFORMED_PAYLOAD",
            Self::MissingSender => "MISSING_SENDER",
        }
    }
}
