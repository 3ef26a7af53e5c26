//! Error types for the Life environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The transport has been shut down and will never deliver again.
    #[error("Transport closed")]
    TransportClosed,

    /// An outbound update could not be queued.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Payload encoding/decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a send error.
    pub fn send(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}
