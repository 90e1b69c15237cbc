//! Inter-switch link entries.
//!
//! A physical link between two datapaths is stored as two directional
//! entries, each owned by the endpoint on its `local` side.

use crate::entry::{push_opt, side_state, EntryId, TableEntry};
use crate::error::{Result, TableError};
use crate::query::Field;
use crate::tables::RF_ISL_TABLE;
use rf_protocol::{FieldValues, FieldValuesExt};
use rf_types::{format_id, MacAddress};
use std::fmt;

/// One end of an inter-switch link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IslEndpoint {
    pub ct_id: u64,
    pub dp_id: u64,
    pub dp_port: u32,
    pub eth_addr: MacAddress,
}

impl IslEndpoint {
    pub fn new(ct_id: u64, dp_id: u64, dp_port: u32, eth_addr: MacAddress) -> Self {
        Self {
            ct_id,
            dp_id,
            dp_port,
            eth_addr,
        }
    }

    /// True if this endpoint is the given switch port.
    pub fn is_port(&self, ct_id: u64, dp_id: u64, dp_port: u32) -> bool {
        self.ct_id == ct_id && self.dp_id == dp_id && self.dp_port == dp_port
    }

    /// True if this endpoint lives on the given datapath.
    pub fn is_on(&self, ct_id: u64, dp_id: u64) -> bool {
        self.ct_id == ct_id && self.dp_id == dp_id
    }
}

impl fmt::Display for IslEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ct_id={} dp_id={} dp_port={} eth_addr={}",
            self.ct_id,
            format_id(self.dp_id),
            self.dp_port,
            self.eth_addr
        )
    }
}

/// Lifecycle state of an [`IslEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IslStatus {
    /// The local endpoint registered, its peer has not.
    IdleLocal = 5,
    /// The peer is known, the local endpoint is not registered.
    IdleRemote = 6,
    Active = 7,
}

/// One direction of an inter-switch link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IslEntry {
    id: Option<EntryId>,
    pub vm_id: Option<u64>,
    pub local: Option<IslEndpoint>,
    pub remote: Option<IslEndpoint>,
}

impl IslEntry {
    pub fn idle_local(vm_id: Option<u64>, local: IslEndpoint) -> Self {
        Self {
            vm_id,
            local: Some(local),
            ..Default::default()
        }
    }

    pub fn active(vm_id: Option<u64>, local: IslEndpoint, remote: IslEndpoint) -> Self {
        Self {
            vm_id,
            local: Some(local),
            remote: Some(remote),
            ..Default::default()
        }
    }

    pub fn status(&self) -> Option<IslStatus> {
        match (self.local.is_some(), self.remote.is_some()) {
            (true, false) => Some(IslStatus::IdleLocal),
            (false, true) => Some(IslStatus::IdleRemote),
            (true, true) => Some(IslStatus::Active),
            (false, false) => None,
        }
    }

    /// Completes whichever side is missing.
    pub fn associate(&mut self, endpoint: IslEndpoint) -> Result<()> {
        match self.status() {
            Some(IslStatus::IdleLocal) => self.remote = Some(endpoint),
            Some(IslStatus::IdleRemote) => self.local = Some(endpoint),
            other => return Err(TableError::invalid_transition("associate", other)),
        }
        Ok(())
    }

    /// Forgets the peer of an active link.
    pub fn make_idle_local(&mut self) -> Result<()> {
        match self.status() {
            Some(IslStatus::Active) => {
                self.remote = None;
                Ok(())
            }
            other => Err(TableError::invalid_transition("idle", other)),
        }
    }
}

fn read_endpoint(
    fvs: &FieldValues,
    fields: [Field; 4],
) -> std::result::Result<Option<IslEndpoint>, String> {
    let [ct, dp, port, mac] = fields;
    let ct_id: Option<u64> = fvs.optional_num(ct.as_str()).map_err(|e| e.to_string())?;
    let dp_id: Option<u64> = fvs.optional_num(dp.as_str()).map_err(|e| e.to_string())?;
    let dp_port: Option<u32> = fvs.optional_num(port.as_str()).map_err(|e| e.to_string())?;
    let eth_addr: Option<MacAddress> = fvs.optional_parse(mac.as_str()).map_err(|e| e.to_string())?;

    match side_state(&[
        ct_id.is_some(),
        dp_id.is_some(),
        dp_port.is_some(),
        eth_addr.is_some(),
    ]) {
        Some(false) => Ok(None),
        Some(true) => match (ct_id, dp_id, dp_port, eth_addr) {
            (Some(c), Some(d), Some(p), Some(m)) => Ok(Some(IslEndpoint::new(c, d, p, m))),
            _ => Ok(None),
        },
        None => Err(format!("partially set endpoint starting at '{}'", ct)),
    }
}

pub(crate) const LOCAL_FIELDS: [Field; 4] =
    [Field::CtId, Field::DpId, Field::DpPort, Field::EthAddr];
pub(crate) const REMOTE_FIELDS: [Field; 4] =
    [Field::RemCt, Field::RemId, Field::RemPort, Field::RemEthAddr];

pub(crate) fn push_endpoint(
    fvs: &mut FieldValues,
    fields: [Field; 4],
    endpoint: Option<&IslEndpoint>,
) {
    let [ct, dp, port, mac] = fields;
    push_opt(fvs, ct, endpoint.map(|e| e.ct_id));
    push_opt(fvs, dp, endpoint.map(|e| e.dp_id));
    push_opt(fvs, port, endpoint.map(|e| e.dp_port));
    push_opt(fvs, mac, endpoint.map(|e| e.eth_addr));
}

pub(crate) fn require_endpoint(
    table: &'static str,
    fvs: &FieldValues,
    fields: [Field; 4],
) -> Result<IslEndpoint> {
    read_endpoint(fvs, fields)
        .map_err(|reason| TableError::invalid_entry(table, reason))?
        .ok_or_else(|| TableError::invalid_entry(table, format!("missing endpoint '{}'", fields[0])))
}

impl TableEntry for IslEntry {
    const TABLE: &'static str = RF_ISL_TABLE;
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
        push_opt(&mut fvs, Field::VmId, self.vm_id);
        push_endpoint(&mut fvs, LOCAL_FIELDS, self.local.as_ref());
        push_endpoint(&mut fvs, REMOTE_FIELDS, self.remote.as_ref());
        fvs
    }

    fn from_fields(id: EntryId, fvs: &FieldValues) -> Result<Self> {
        let invalid = |reason: String| TableError::invalid_entry(Self::TABLE, reason);
        let entry = Self {
            id: Some(id),
            vm_id: fvs
                .optional_num(Field::VmId.as_str())
                .map_err(|e| TableError::from_field(Self::TABLE, e))?,
            local: read_endpoint(fvs, LOCAL_FIELDS).map_err(invalid)?,
            remote: read_endpoint(fvs, REMOTE_FIELDS).map_err(invalid)?,
        };
        if entry.status().is_none() {
            return Err(invalid("both endpoints unset".to_string()));
        }
        Ok(entry)
    }
}
