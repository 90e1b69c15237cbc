//! In-process table backend.

use crate::entry::{EntryId, Table, TableEntry};
use crate::error::Result;
use crate::query::Query;
use async_trait::async_trait;
use log::debug;
use rf_protocol::FieldValues;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Table kept in memory.
///
/// Rows are held in their serialized string form, so reads go through the
/// same decoding as the Redis backend.
pub struct MemoryTable<E> {
    rows: RwLock<BTreeMap<EntryId, FieldValues>>,
    next_id: AtomicU64,
    _entry: PhantomData<fn() -> E>,
}

impl<E: TableEntry> MemoryTable<E> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            _entry: PhantomData,
        }
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

impl<E: TableEntry> Default for MemoryTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: TableEntry> Table<E> for MemoryTable<E> {
    async fn find(&self, query: &Query) -> Result<Vec<E>> {
        query.check_table(E::TABLE)?;
        let rows = self.rows.read().await;
        rows.iter()
            .filter(|(_, fvs)| query.matches(fvs))
            .map(|(id, fvs)| E::from_fields(id.clone(), fvs))
            .collect()
    }

    async fn upsert(&self, mut entry: E) -> Result<E> {
        let id = match entry.entry_id() {
            Some(id) => id.clone(),
            None => {
                let id = EntryId::new(self.next_id.fetch_add(1, Ordering::Relaxed).to_string());
                entry.set_entry_id(id.clone());
                id
            }
        };
        debug!("{}: upsert {}", E::TABLE, id);
        self.rows.write().await.insert(id, entry.to_fields());
        Ok(entry)
    }

    async fn delete(&self, entry: &E) -> Result<()> {
        if let Some(id) = entry.entry_id() {
            debug!("{}: delete {}", E::TABLE, id);
            self.rows.write().await.remove(id);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.rows.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Field;
    use crate::{AssociationEntry, AssociationStatus, IslEntry, TableError};
    use pretty_assertions::assert_eq;

    fn by_dp(ct_id: u64, dp_id: u64) -> Query {
        Query::builder::<AssociationEntry>()
            .eq(Field::CtId, ct_id)
            .eq(Field::DpId, dp_id)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_assigns_id_and_replaces() {
        let table = MemoryTable::<AssociationEntry>::new();
        let stored = table.upsert(AssociationEntry::idle_vm(0x1, 0, None)).await.unwrap();
        assert!(stored.entry_id().is_some());

        let mut updated = stored.clone();
        updated.associate_dp(1, 0x10, 2).unwrap();
        let updated = table.upsert(updated).await.unwrap();
        assert_eq!(updated.entry_id(), stored.entry_id());
        assert_eq!(table.len().await, 1);

        let found = table.find_one(&by_dp(1, 0x10)).await.unwrap().unwrap();
        assert_eq!(found, updated);
        assert_eq!(found.status(), Some(AssociationStatus::Associated));
    }

    #[tokio::test]
    async fn test_partial_key_queries() {
        let table = MemoryTable::<AssociationEntry>::new();
        for port in 1..=3 {
            table.upsert(AssociationEntry::idle_dp(1, 0x10, port)).await.unwrap();
        }
        table.upsert(AssociationEntry::idle_dp(1, 0x20, 1)).await.unwrap();
        table.upsert(AssociationEntry::idle_vm(0x1, 0, None)).await.unwrap();

        assert_eq!(table.find(&by_dp(1, 0x10)).await.unwrap().len(), 3);
        assert_eq!(table.find(&Query::all::<AssociationEntry>()).await.unwrap().len(), 5);

        let idle_vm = Query::builder::<AssociationEntry>()
            .unset(Field::DpId)
            .build()
            .unwrap();
        let found = table.find(&idle_vm).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].vm_id, Some(0x1));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let table = MemoryTable::<AssociationEntry>::new();
        let a = table.upsert(AssociationEntry::idle_dp(1, 0x10, 1)).await.unwrap();
        table.upsert(AssociationEntry::idle_dp(1, 0x10, 2)).await.unwrap();

        table.delete(&a).await.unwrap();
        assert_eq!(table.len().await, 1);

        // Unsaved entries have no id and are ignored
        table.delete(&AssociationEntry::idle_dp(1, 0x10, 2)).await.unwrap();
        assert_eq!(table.len().await, 1);

        table.clear().await.unwrap();
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_for_other_table_rejected() {
        let table = MemoryTable::<IslEntry>::new();
        let err = table.find(&by_dp(1, 0x10)).await.unwrap_err();
        assert_eq!(
            err,
            TableError::TableMismatch {
                query: "rftable",
                table: "rfisltable"
            }
        );
    }
}
