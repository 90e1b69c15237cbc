//! IPC error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload could not be serialized or parsed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The channel is already being listened on by this service.
    #[error("already listening on channel {0}")]
    AlreadyListening(String),
}

impl IpcError {
    /// Returns true if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IpcError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, IpcError>;
