//! Error types for the coordination server.

use rf_flow::TranslateError;
use rf_ipc::IpcError;
use rf_protocol::ProtocolError;
use rf_table::TableError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Entry store failure.
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// Transport failure.
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("translation error: {0}")]
    Translate(#[from] TranslateError),

    /// Invalid daemon settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid row in a static config file.
    #[error("{}:{line}: {reason}", path.display())]
    StaticConfig {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A store or transport call exceeded its time budget.
    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        ServerError::Config(message.into())
    }

    pub fn static_config(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        ServerError::StaticConfig {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServerError::Table(e) => e.is_retryable(),
            ServerError::Ipc(e) => e.is_retryable(),
            ServerError::Timeout(_) | ServerError::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = ServerError::static_config("/etc/routeflow/rfconfig.csv", 3, "invalid vm_id 'zz'");
        assert_eq!(
            err.to_string(),
            "/etc/routeflow/rfconfig.csv:3: invalid vm_id 'zz'"
        );

        let err = ServerError::Timeout("rftable find");
        assert_eq!(err.to_string(), "rftable find timed out");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ServerError::Timeout("send").is_retryable());
        assert!(ServerError::Table(TableError::Backend("down".into())).is_retryable());
        assert!(!ServerError::config("bad").is_retryable());
        assert!(!ServerError::Translate(TranslateError::UnsupportedMatch(2)).is_retryable());
    }
}
