//! Redis table backend.
//!
//! Each entry is a hash at `<table>|<id>`; ids come from the counter at
//! `<table>_ID`. Every serialized field is written, including empty ones, so
//! a read reproduces the exact field list.

use crate::entry::{EntryId, Table, TableEntry};
use crate::error::{Result, TableError};
use crate::query::Query;
use async_trait::async_trait;
use log::{debug, info};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use rf_protocol::FieldValues;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Connection settings for [`RedisTable`].
#[derive(Debug, Clone)]
pub struct RedisTableConfig {
    pub host: String,
    pub port: u16,
    pub db: u32,
}

impl RedisTableConfig {
    pub fn new(host: impl Into<String>, port: u16, db: u32) -> Self {
        Self {
            host: host.into(),
            port,
            db,
        }
    }

    fn uri(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Table stored in a Redis database.
pub struct RedisTable<E> {
    connection: ConnectionManager,
    _entry: PhantomData<fn() -> E>,
}

fn backend(op: &str, e: redis::RedisError) -> TableError {
    TableError::Backend(format!("{} failed: {}", op, e))
}

impl<E: TableEntry> RedisTable<E> {
    /// Connects to the database.
    pub async fn connect(config: &RedisTableConfig) -> Result<Self> {
        let uri = config.uri();
        let client = redis::Client::open(uri.clone())
            .map_err(|e| TableError::Backend(format!("{}: {}", uri, e)))?;
        let connection = client.get_connection_manager().await.map_err(|e| {
            TableError::Backend(format!("failed to create connection manager: {}", e))
        })?;
        info!("{}: connected to Redis {}:{}", E::TABLE, config.host, config.port);
        Ok(Self::with_connection(connection))
    }

    /// Shares an existing connection.
    pub fn with_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            _entry: PhantomData,
        }
    }

    fn key(id: &EntryId) -> String {
        format!("{}|{}", E::TABLE, id)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        conn.keys(format!("{}|*", E::TABLE))
            .await
            .map_err(|e| backend("KEYS", e))
    }
}

#[async_trait]
impl<E: TableEntry> Table<E> for RedisTable<E> {
    async fn find(&self, query: &Query) -> Result<Vec<E>> {
        query.check_table(E::TABLE)?;
        let mut conn = self.connection.clone();
        let mut found = Vec::new();

        for key in self.keys().await? {
            let raw: HashMap<String, String> =
                conn.hgetall(&key).await.map_err(|e| backend("HGETALL", e))?;
            if raw.is_empty() {
                // Deleted between KEYS and HGETALL
                continue;
            }
            let fvs: FieldValues = raw.into_iter().collect();
            if !query.matches(&fvs) {
                continue;
            }
            let id = key
                .split_once('|')
                .map(|(_, id)| id)
                .unwrap_or_default();
            found.push(E::from_fields(EntryId::new(id), &fvs)?);
        }

        debug!("{}: {} matched {} entries", E::TABLE, query, found.len());
        Ok(found)
    }

    async fn upsert(&self, mut entry: E) -> Result<E> {
        let mut conn = self.connection.clone();
        let id = match entry.entry_id() {
            Some(id) => id.clone(),
            None => {
                let next: u64 = conn
                    .incr(format!("{}_ID", E::TABLE), 1)
                    .await
                    .map_err(|e| backend("INCR", e))?;
                let id = EntryId::new(next.to_string());
                entry.set_entry_id(id.clone());
                id
            }
        };

        let fields = entry.to_fields();
        let _: () = conn
            .hset_multiple(Self::key(&id), fields.as_slice())
            .await
            .map_err(|e| backend("HSET", e))?;
        Ok(entry)
    }

    async fn delete(&self, entry: &E) -> Result<()> {
        let Some(id) = entry.entry_id() else {
            return Ok(());
        };
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(Self::key(id))
            .await
            .map_err(|e| backend("DEL", e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let keys = self.keys().await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        let _: () = conn.del(&keys).await.map_err(|e| backend("DEL", e))?;
        info!("{}: cleared {} entries", E::TABLE, keys.len());
        Ok(())
    }
}
