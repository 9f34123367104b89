//! Handler error types

use crate::broadcast::PublishError;
use thiserror::Error;

/// Handler error type
///
/// None of these end the session: the offending frame is dropped and the
/// reader moves on.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Frame exceeds the configured size limit
    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Binary frame that is not valid UTF-8
    #[error("Binary frame is not valid UTF-8")]
    InvalidUtf8,

    /// Channel publish failed
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl HandlerError {
    /// Get error code for log fields
    pub fn code(&self) -> &'static str {
        match self {
            Self::FrameTooLarge { .. } => "FRAME_TOO_LARGE",
            Self::InvalidUtf8 => "INVALID_UTF8",
            Self::Publish(PublishError::Codec(e)) => e.code(),
            Self::Publish(PublishError::Transport(_)) => "PUBLISH_FAILED",
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
