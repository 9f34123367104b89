//! Channel transport errors.

use relay_common::RelayError;

/// Error type for channel transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("No cluster node accepted the subscription")]
    NoClusterNodes,

    #[error("Channel closed")]
    ChannelClosed,
}

impl TransportError {
    /// Check if the error means the underlying connection is gone
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::Redis(e) => e.is_io_error() || e.is_connection_dropped() || e.is_timeout(),
            Self::GetConnection(_) | Self::NoClusterNodes | Self::ChannelClosed => true,
            Self::CreatePool(_) => false,
        }
    }
}

impl From<TransportError> for RelayError {
    fn from(err: TransportError) -> Self {
        RelayError::transport(err)
    }
}

/// Result type for channel transport operations
pub type TransportResult<T> = Result<T, TransportError>;
