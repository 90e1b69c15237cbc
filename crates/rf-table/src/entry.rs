//! Entry and table abstractions.

use crate::error::Result;
use crate::query::{Field, Query};
use async_trait::async_trait;
use rf_protocol::FieldValues;
use std::fmt;

/// Store-assigned identifier of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        EntryId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value that can be stored in a [`Table`].
pub trait TableEntry: Clone + Send + Sync + 'static {
    /// Name of the table holding this entry type.
    const TABLE: &'static str;

    /// Fields that are serialized and may be queried.
    const FIELDS: &'static [Field];

    fn entry_id(&self) -> Option<&EntryId>;

    fn set_entry_id(&mut self, id: EntryId);

    /// Serializes every field in [`TableEntry::FIELDS`] order; unset is `""`.
    fn to_fields(&self) -> FieldValues;

    /// Rebuilds an entry from its serialized form.
    fn from_fields(id: EntryId, fvs: &FieldValues) -> Result<Self>;
}

/// Attribute-indexed entry storage.
///
/// Writes are last-writer-wins; callers serialize their updates.
#[async_trait]
pub trait Table<E: TableEntry>: Send + Sync {
    /// Returns every entry matching the query.
    async fn find(&self, query: &Query) -> Result<Vec<E>>;

    /// Inserts a new entry or replaces the entry with the same id.
    /// Returns the entry with its id assigned.
    async fn upsert(&self, entry: E) -> Result<E>;

    /// Removes an entry. Entries without an id are ignored.
    async fn delete(&self, entry: &E) -> Result<()>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;

    /// Returns the first entry matching the query.
    async fn find_one(&self, query: &Query) -> Result<Option<E>> {
        Ok(self.find(query).await?.into_iter().next())
    }
}

/// Appends an optional value; `None` becomes the empty string.
pub(crate) fn push_opt<T: fmt::Display>(fvs: &mut FieldValues, field: Field, value: Option<T>) {
    let value = value.map(|v| v.to_string()).unwrap_or_default();
    fvs.push((field.as_str().to_string(), value));
}

/// Classifies a group of related fields: all set, all unset, or mixed.
pub(crate) fn side_state(parts: &[bool]) -> Option<bool> {
    if parts.iter().all(|set| *set) {
        Some(true)
    } else if parts.iter().all(|set| !*set) {
        Some(false)
    } else {
        None
    }
}
