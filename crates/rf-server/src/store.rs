//! The tables the server works on.

#[cfg(feature = "redis")]
use crate::error::Result;
use rf_table::{AssociationEntry, ConfigEntry, IslConfigEntry, IslEntry, MemoryTable, Table};
#[cfg(feature = "redis")]
use rf_table::{RedisTable, RedisTableConfig};
use std::sync::Arc;

/// Handles to every table, shared by the engine and startup code.
#[derive(Clone)]
pub struct Tables {
    pub associations: Arc<dyn Table<AssociationEntry>>,
    pub isls: Arc<dyn Table<IslEntry>>,
    pub config: Arc<dyn Table<ConfigEntry>>,
    pub isl_config: Arc<dyn Table<IslConfigEntry>>,
}

impl Tables {
    pub fn in_memory() -> Self {
        Self {
            associations: Arc::new(MemoryTable::<AssociationEntry>::new()),
            isls: Arc::new(MemoryTable::<IslEntry>::new()),
            config: Arc::new(MemoryTable::<ConfigEntry>::new()),
            isl_config: Arc::new(MemoryTable::<IslConfigEntry>::new()),
        }
    }

    #[cfg(feature = "redis")]
    pub async fn connect_redis(config: &RedisTableConfig) -> Result<Self> {
        Ok(Self {
            associations: Arc::new(RedisTable::<AssociationEntry>::connect(config).await?),
            isls: Arc::new(RedisTable::<IslEntry>::connect(config).await?),
            config: Arc::new(RedisTable::<ConfigEntry>::connect(config).await?),
            isl_config: Arc::new(RedisTable::<IslConfigEntry>::connect(config).await?),
        })
    }
}
