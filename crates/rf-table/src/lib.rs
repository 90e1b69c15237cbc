//! Entry tables for the RouteFlow coordination server.
//!
//! Three entry families live here:
//!
//! - [`AssociationEntry`]: binds a virtual router port to a switch port and,
//!   once mapped, to an overlay switch port.
//! - [`IslEntry`]: one direction of an inter-switch link.
//! - [`ConfigEntry`] / [`IslConfigEntry`]: static configuration rows.
//!
//! Every entry serializes to an all-string field list in which an unset
//! field is an empty string, and deserializes back to an identical value.
//! Tables are queried with a typed [`Query`] that only accepts the fields
//! the entry type actually has.

mod association;
mod config;
mod entry;
mod error;
mod isl;
mod memory;
mod query;
#[cfg(feature = "redis")]
mod redis_table;

pub use association::{AssociationEntry, AssociationStatus};
pub use config::{ConfigEntry, IslConfigEntry};
pub use entry::{EntryId, Table, TableEntry};
pub use error::{Result, TableError};
pub use isl::{IslEndpoint, IslEntry, IslStatus};
pub use memory::MemoryTable;
pub use query::{Field, Query, QueryBuilder};
#[cfg(feature = "redis")]
pub use redis_table::{RedisTable, RedisTableConfig};

/// Table names.
pub mod tables {
    pub const RF_TABLE: &str = "rftable";
    pub const RF_CONFIG: &str = "rfconfig";
    pub const RF_ISL_TABLE: &str = "rfisltable";
    pub const RF_ISL_CONFIG: &str = "rfislconf";
}
