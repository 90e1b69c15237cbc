//! Static configuration rows.

use crate::entry::{push_opt, EntryId, TableEntry};
use crate::error::{Result, TableError};
use crate::isl::{push_endpoint, require_endpoint, IslEndpoint, LOCAL_FIELDS, REMOTE_FIELDS};
use crate::query::Field;
use crate::tables::{RF_CONFIG, RF_ISL_CONFIG};
use rf_protocol::{FieldError, FieldValues, FieldValuesExt};
use rf_types::format_id;
use std::fmt;

/// Pairs a VM port with the datapath port it should be bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    id: Option<EntryId>,
    pub vm_id: u64,
    pub vm_port: u32,
    pub ct_id: u64,
    pub dp_id: u64,
    pub dp_port: u32,
}

impl ConfigEntry {
    pub fn new(vm_id: u64, vm_port: u32, ct_id: u64, dp_id: u64, dp_port: u32) -> Self {
        Self {
            id: None,
            vm_id,
            vm_port,
            ct_id,
            dp_id,
            dp_port,
        }
    }

    pub fn is_vm_port(&self, vm_id: u64, vm_port: u32) -> bool {
        self.vm_id == vm_id && self.vm_port == vm_port
    }

    pub fn is_dp_port(&self, ct_id: u64, dp_id: u64, dp_port: u32) -> bool {
        self.ct_id == ct_id && self.dp_id == dp_id && self.dp_port == dp_port
    }
}

impl fmt::Display for ConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vm_id={} vm_port={} ct_id={} dp_id={} dp_port={}",
            format_id(self.vm_id),
            self.vm_port,
            self.ct_id,
            format_id(self.dp_id),
            self.dp_port
        )
    }
}

impl TableEntry for ConfigEntry {
    const TABLE: &'static str = RF_CONFIG;
    const FIELDS: &'static [Field] = &[
        Field::VmId,
        Field::VmPort,
        Field::CtId,
        Field::DpId,
        Field::DpPort,
    ];

    fn entry_id(&self) -> Option<&EntryId> {
        self.id.as_ref()
    }

    fn set_entry_id(&mut self, id: EntryId) {
        self.id = Some(id);
    }

    fn to_fields(&self) -> FieldValues {
        let mut fvs = FieldValues::with_capacity(Self::FIELDS.len());
        push_opt(&mut fvs, Field::VmId, Some(self.vm_id));
        push_opt(&mut fvs, Field::VmPort, Some(self.vm_port));
        push_opt(&mut fvs, Field::CtId, Some(self.ct_id));
        push_opt(&mut fvs, Field::DpId, Some(self.dp_id));
        push_opt(&mut fvs, Field::DpPort, Some(self.dp_port));
        fvs
    }

    fn from_fields(id: EntryId, fvs: &FieldValues) -> Result<Self> {
        let err = |e: FieldError| TableError::from_field(Self::TABLE, e);
        Ok(Self {
            id: Some(id),
            vm_id: fvs.require_num(Field::VmId.as_str()).map_err(err)?,
            vm_port: fvs.require_num(Field::VmPort.as_str()).map_err(err)?,
            ct_id: fvs.require_num(Field::CtId.as_str()).map_err(err)?,
            dp_id: fvs.require_num(Field::DpId.as_str()).map_err(err)?,
            dp_port: fvs.require_num(Field::DpPort.as_str()).map_err(err)?,
        })
    }
}

/// A configured inter-switch link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslConfigEntry {
    id: Option<EntryId>,
    pub vm_id: u64,
    pub local: IslEndpoint,
    pub remote: IslEndpoint,
}

impl IslConfigEntry {
    pub fn new(vm_id: u64, local: IslEndpoint, remote: IslEndpoint) -> Self {
        Self {
            id: None,
            vm_id,
            local,
            remote,
        }
    }

    /// Orients the link from the given port.
    ///
    /// Returns `(this_end, peer)` if the port is either end of the link.
    pub fn oriented_from(
        &self,
        ct_id: u64,
        dp_id: u64,
        dp_port: u32,
    ) -> Option<(IslEndpoint, IslEndpoint)> {
        if self.local.is_port(ct_id, dp_id, dp_port) {
            Some((self.local, self.remote))
        } else if self.remote.is_port(ct_id, dp_id, dp_port) {
            Some((self.remote, self.local))
        } else {
            None
        }
    }
}

impl TableEntry for IslConfigEntry {
    const TABLE: &'static str = RF_ISL_CONFIG;
    const FIELDS: &'static [Field] = &[
        Field::VmId,
        Field::CtId,
        Field::DpId,
        Field::DpPort,
        Field::EthAddr,
        Field::RemCt,
        Field::RemId,
        Field::RemPort,
        Field::RemEthAddr,
    ];

    fn entry_id(&self) -> Option<&EntryId> {
        self.id.as_ref()
    }

    fn set_entry_id(&mut self, id: EntryId) {
        self.id = Some(id);
    }

    fn to_fields(&self) -> FieldValues {
        let mut fvs = FieldValues::with_capacity(Self::FIELDS.len());
        push_opt(&mut fvs, Field::VmId, Some(self.vm_id));
        push_endpoint(&mut fvs, LOCAL_FIELDS, Some(&self.local));
        push_endpoint(&mut fvs, REMOTE_FIELDS, Some(&self.remote));
        fvs
    }

    fn from_fields(id: EntryId, fvs: &FieldValues) -> Result<Self> {
        Ok(Self {
            id: Some(id),
            vm_id: fvs
                .require_num(Field::VmId.as_str())
                .map_err(|e| TableError::from_field(Self::TABLE, e))?,
            local: require_endpoint(Self::TABLE, fvs, LOCAL_FIELDS)?,
            remote: require_endpoint(Self::TABLE, fvs, REMOTE_FIELDS)?,
        })
    }
}
