//! Translation errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("unsupported required match kind {0}")]
    UnsupportedMatch(u8),

    #[error("unsupported required action kind {0}")]
    UnsupportedAction(u8),

    #[error("unsupported required option kind {0}")]
    UnsupportedOption(u8),

    /// The same match field was given two different values.
    #[error("conflicting values for match kind {0}")]
    ConflictingMatch(u8),

    #[error("conflicting values for option kind {0}")]
    ConflictingOption(u8),

    /// An encoder could not serialize a translated flow.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl TranslateError {
    /// Kind code that caused the failure, if any.
    pub fn kind(&self) -> Option<u8> {
        match self {
            TranslateError::UnsupportedMatch(k)
            | TranslateError::UnsupportedAction(k)
            | TranslateError::UnsupportedOption(k)
            | TranslateError::ConflictingMatch(k)
            | TranslateError::ConflictingOption(k) => Some(*k),
            TranslateError::Encode(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;
