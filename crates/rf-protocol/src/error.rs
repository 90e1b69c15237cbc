//! Error types for message decoding.

use thiserror::Error;

/// A single field could not be read from a field-value list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("missing field '{0}'")]
    Missing(String),

    #[error("invalid value '{value}' for field '{field}'")]
    Invalid { field: String, value: String },
}

impl FieldError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing(field.into())
    }

    pub fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Errors raised while decoding or encoding IPC messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("unknown message kind '{0}'")]
    UnknownKind(String),

    #[error("invalid {what} entry at index {index}: {reason}")]
    InvalidTlv {
        what: &'static str,
        index: usize,
        reason: String,
    },
}

impl ProtocolError {
    pub fn invalid_tlv(what: &'static str, index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidTlv {
            what,
            index,
            reason: reason.into(),
        }
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
