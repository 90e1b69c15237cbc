//! Error types for entry tables.

use rf_protocol::FieldError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A query named a field the entry type does not have.
    #[error("field '{field}' is not queryable on table {table}")]
    UnsupportedField { table: &'static str, field: String },

    /// A query built for one table was run against another.
    #[error("query for table {query} used on table {table}")]
    TableMismatch {
        query: &'static str,
        table: &'static str,
    },

    /// A stored row does not form a valid entry.
    #[error("invalid entry in table {table}: {reason}")]
    InvalidEntry { table: &'static str, reason: String },

    /// A state transition was requested from the wrong state.
    #[error("cannot {transition} entry in state {state}")]
    InvalidTransition {
        transition: &'static str,
        state: String,
    },

    /// The storage backend failed.
    #[error("backend error: {0}")]
    Backend(String),
}

impl TableError {
    pub fn invalid_entry(table: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            table,
            reason: reason.into(),
        }
    }

    pub fn from_field(table: &'static str, err: FieldError) -> Self {
        Self::invalid_entry(table, err.to_string())
    }

    pub fn invalid_transition(transition: &'static str, state: impl std::fmt::Debug) -> Self {
        Self::InvalidTransition {
            transition,
            state: format!("{:?}", state),
        }
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TableError::Backend(_))
    }
}

pub type Result<T> = std::result::Result<T, TableError>;
