//! Typed attribute-predicate queries.

use crate::entry::TableEntry;
use crate::error::{Result, TableError};
use rf_protocol::{FieldValues, FieldValuesExt};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Every attribute an entry table can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    VmId,
    VmPort,
    CtId,
    DpId,
    DpPort,
    VsId,
    VsPort,
    EthAddr,
    RemCt,
    RemId,
    RemPort,
    RemEthAddr,
}

impl Field {
    pub const fn as_str(self) -> &'static str {
        match self {
            Field::VmId => "vm_id",
            Field::VmPort => "vm_port",
            Field::CtId => "ct_id",
            Field::DpId => "dp_id",
            Field::DpPort => "dp_port",
            Field::VsId => "vs_id",
            Field::VsPort => "vs_port",
            Field::EthAddr => "eth_addr",
            Field::RemCt => "rem_ct",
            Field::RemId => "rem_id",
            Field::RemPort => "rem_port",
            Field::RemEthAddr => "rem_eth_addr",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "vm_id" => Field::VmId,
            "vm_port" => Field::VmPort,
            "ct_id" => Field::CtId,
            "dp_id" => Field::DpId,
            "dp_port" => Field::DpPort,
            "vs_id" => Field::VsId,
            "vs_port" => Field::VsPort,
            "eth_addr" => Field::EthAddr,
            "rem_ct" => Field::RemCt,
            "rem_id" => Field::RemId,
            "rem_port" => Field::RemPort,
            "rem_eth_addr" => Field::RemEthAddr,
            other => return Err(other.to_string()),
        })
    }
}

/// A conjunction of field predicates bound to one table.
///
/// A predicate value of `""` matches entries where the field is unset.
/// A query with no predicates matches every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: &'static str,
    predicates: BTreeMap<Field, String>,
}

impl Query {
    /// Starts a query for entries of type `E`.
    pub fn builder<E: TableEntry>() -> QueryBuilder {
        QueryBuilder {
            table: E::TABLE,
            allowed: E::FIELDS,
            predicates: BTreeMap::new(),
            error: None,
        }
    }

    /// A query matching every entry of type `E`.
    pub fn all<E: TableEntry>() -> Query {
        Query {
            table: E::TABLE,
            predicates: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn predicates(&self) -> impl Iterator<Item = (Field, &str)> {
        self.predicates.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Returns true if a serialized entry satisfies every predicate.
    pub fn matches(&self, fvs: &FieldValues) -> bool {
        self.predicates
            .iter()
            .all(|(field, value)| fvs.get_field(field.as_str()).unwrap_or("") == value)
    }

    pub(crate) fn check_table(&self, table: &'static str) -> Result<()> {
        if self.table != table {
            return Err(TableError::TableMismatch {
                query: self.table,
                table,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.table)?;
        for (i, (field, value)) in self.predicates.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:?}", field, value)?;
        }
        f.write_str("}")
    }
}

/// Builder for [`Query`]. Errors are deferred to [`QueryBuilder::build`].
#[derive(Debug)]
pub struct QueryBuilder {
    table: &'static str,
    allowed: &'static [Field],
    predicates: BTreeMap<Field, String>,
    error: Option<TableError>,
}

impl QueryBuilder {
    /// Requires `field` to equal `value`.
    pub fn eq(mut self, field: Field, value: impl fmt::Display) -> Self {
        self.insert(field, value.to_string());
        self
    }

    /// Requires `field` to be unset.
    pub fn unset(mut self, field: Field) -> Self {
        self.insert(field, String::new());
        self
    }

    /// Requires the field named `key` to equal `value`.
    pub fn key(mut self, key: &str, value: impl fmt::Display) -> Self {
        match key.parse::<Field>() {
            Ok(field) => self.insert(field, value.to_string()),
            Err(unknown) => self.reject(unknown),
        }
        self
    }

    pub fn build(self) -> Result<Query> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Query {
                table: self.table,
                predicates: self.predicates,
            }),
        }
    }

    fn insert(&mut self, field: Field, value: String) {
        if self.allowed.contains(&field) {
            self.predicates.insert(field, value);
        } else {
            self.reject(field.to_string());
        }
    }

    fn reject(&mut self, field: String) {
        if self.error.is_none() {
            self.error = Some(TableError::UnsupportedField {
                table: self.table,
                field,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssociationEntry, ConfigEntry};
    use pretty_assertions::assert_eq;
    use rf_protocol::field_values;

    #[test]
    fn test_field_names_round_trip() {
        for field in AssociationEntry::FIELDS {
            assert_eq!(field.as_str().parse::<Field>(), Ok(*field));
        }
        assert!("vm".parse::<Field>().is_err());
    }

    #[test]
    fn test_unknown_key_rejected_at_build() {
        let err = Query::builder::<AssociationEntry>()
            .eq(Field::VmId, 1)
            .key("vmid", 1)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            TableError::UnsupportedField {
                table: "rftable",
                field: "vmid".to_string()
            }
        );
    }

    #[test]
    fn test_field_not_on_table_rejected() {
        let err = Query::builder::<ConfigEntry>()
            .eq(Field::VsId, 9)
            .build()
            .unwrap_err();
        assert!(matches!(err, TableError::UnsupportedField { table: "rfconfig", .. }));
    }

    #[test]
    fn test_matches_partial_key_and_unset() {
        let query = Query::builder::<AssociationEntry>()
            .eq(Field::DpId, 16)
            .unset(Field::VsId)
            .build()
            .unwrap();

        let hit = field_values! { "dp_id" => "16", "dp_port" => "2", "vs_id" => "" };
        let missing_field = field_values! { "dp_id" => "16" };
        let miss = field_values! { "dp_id" => "16", "vs_id" => "9" };

        assert!(query.matches(&hit));
        assert!(query.matches(&missing_field));
        assert!(!query.matches(&miss));
    }

    #[test]
    fn test_display() {
        let query = Query::builder::<AssociationEntry>()
            .eq(Field::CtId, 1)
            .eq(Field::DpId, 16)
            .build()
            .unwrap();
        assert_eq!(query.to_string(), "rftable{ct_id=\"1\", dp_id=\"16\"}");
    }
}
