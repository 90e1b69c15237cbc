//! VM port to datapath port association entries.

use crate::entry::{push_opt, side_state, EntryId, TableEntry};
use crate::error::{Result, TableError};
use crate::query::Field;
use crate::tables::RF_TABLE;
use rf_protocol::{FieldError, FieldValues, FieldValuesExt};
use rf_types::{format_id, MacAddress};
use std::fmt;

/// Lifecycle state of an [`AssociationEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationStatus {
    /// Only the virtual router port is known.
    IdleVmPort = 1,
    /// Only the datapath port is known.
    IdleDpPort = 2,
    /// Both ports are bound, no overlay port yet.
    Associated = 3,
    /// Bound and mapped onto an overlay switch port.
    Active = 4,
}

impl AssociationStatus {
    /// True for states where the datapath port is bound to a VM port.
    pub fn is_bound(self) -> bool {
        matches!(self, AssociationStatus::Associated | AssociationStatus::Active)
    }
}

/// Binding between a VM port, a datapath port and an overlay port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationEntry {
    id: Option<EntryId>,
    pub vm_id: Option<u64>,
    pub vm_port: Option<u32>,
    pub eth_addr: Option<MacAddress>,
    pub ct_id: Option<u64>,
    pub dp_id: Option<u64>,
    pub dp_port: Option<u32>,
    pub vs_id: Option<u64>,
    pub vs_port: Option<u32>,
}

impl AssociationEntry {
    pub fn idle_vm(vm_id: u64, vm_port: u32, eth_addr: Option<MacAddress>) -> Self {
        Self {
            vm_id: Some(vm_id),
            vm_port: Some(vm_port),
            eth_addr,
            ..Default::default()
        }
    }

    pub fn idle_dp(ct_id: u64, dp_id: u64, dp_port: u32) -> Self {
        Self {
            ct_id: Some(ct_id),
            dp_id: Some(dp_id),
            dp_port: Some(dp_port),
            ..Default::default()
        }
    }

    /// Derives the state from which fields are set.
    ///
    /// Returns `None` for combinations no transition can produce, such as a
    /// half-set side or an overlay port without both other sides.
    pub fn status(&self) -> Option<AssociationStatus> {
        let vm = side_state(&[self.vm_id.is_some(), self.vm_port.is_some()])?;
        let dp = side_state(&[
            self.ct_id.is_some(),
            self.dp_id.is_some(),
            self.dp_port.is_some(),
        ])?;
        let vs = side_state(&[self.vs_id.is_some(), self.vs_port.is_some()])?;
        if self.eth_addr.is_some() && !vm {
            return None;
        }

        match (vm, dp, vs) {
            (true, false, false) => Some(AssociationStatus::IdleVmPort),
            (false, true, false) => Some(AssociationStatus::IdleDpPort),
            (true, true, false) => Some(AssociationStatus::Associated),
            (true, true, true) => Some(AssociationStatus::Active),
            _ => None,
        }
    }

    /// Binds a datapath port to an idle VM port.
    pub fn associate_dp(&mut self, ct_id: u64, dp_id: u64, dp_port: u32) -> Result<()> {
        self.expect_status(AssociationStatus::IdleVmPort, "associate datapath port of")?;
        self.ct_id = Some(ct_id);
        self.dp_id = Some(dp_id);
        self.dp_port = Some(dp_port);
        Ok(())
    }

    /// Binds a VM port to an idle datapath port.
    pub fn associate_vm(
        &mut self,
        vm_id: u64,
        vm_port: u32,
        eth_addr: Option<MacAddress>,
    ) -> Result<()> {
        self.expect_status(AssociationStatus::IdleDpPort, "associate VM port of")?;
        self.vm_id = Some(vm_id);
        self.vm_port = Some(vm_port);
        self.eth_addr = eth_addr;
        Ok(())
    }

    /// Records the overlay port of an associated entry.
    pub fn activate(&mut self, vs_id: u64, vs_port: u32) -> Result<()> {
        self.expect_status(AssociationStatus::Associated, "activate")?;
        self.vs_id = Some(vs_id);
        self.vs_port = Some(vs_port);
        Ok(())
    }

    /// Drops the datapath and overlay sides, keeping the VM port.
    pub fn make_idle_vm(&mut self) -> Result<()> {
        match self.status() {
            Some(status) if status.is_bound() => {
                self.ct_id = None;
                self.dp_id = None;
                self.dp_port = None;
                self.vs_id = None;
                self.vs_port = None;
                Ok(())
            }
            other => Err(TableError::invalid_transition("idle", other)),
        }
    }

    fn expect_status(&self, expected: AssociationStatus, transition: &'static str) -> Result<()> {
        match self.status() {
            Some(status) if status == expected => Ok(()),
            other => Err(TableError::invalid_transition(transition, other)),
        }
    }
}

impl TableEntry for AssociationEntry {
    const TABLE: &'static str = RF_TABLE;
    const FIELDS: &'static [Field] = &[
        Field::VmId,
        Field::VmPort,
        Field::CtId,
        Field::DpId,
        Field::DpPort,
        Field::VsId,
        Field::VsPort,
        Field::EthAddr,
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
        push_opt(&mut fvs, Field::VmPort, self.vm_port);
        push_opt(&mut fvs, Field::CtId, self.ct_id);
        push_opt(&mut fvs, Field::DpId, self.dp_id);
        push_opt(&mut fvs, Field::DpPort, self.dp_port);
        push_opt(&mut fvs, Field::VsId, self.vs_id);
        push_opt(&mut fvs, Field::VsPort, self.vs_port);
        push_opt(&mut fvs, Field::EthAddr, self.eth_addr);
        fvs
    }

    fn from_fields(id: EntryId, fvs: &FieldValues) -> Result<Self> {
        let err = |e: FieldError| TableError::from_field(Self::TABLE, e);
        let entry = Self {
            id: Some(id),
            vm_id: fvs.optional_num(Field::VmId.as_str()).map_err(err)?,
            vm_port: fvs.optional_num(Field::VmPort.as_str()).map_err(err)?,
            eth_addr: fvs.optional_parse(Field::EthAddr.as_str()).map_err(err)?,
            ct_id: fvs.optional_num(Field::CtId.as_str()).map_err(err)?,
            dp_id: fvs.optional_num(Field::DpId.as_str()).map_err(err)?,
            dp_port: fvs.optional_num(Field::DpPort.as_str()).map_err(err)?,
            vs_id: fvs.optional_num(Field::VsId.as_str()).map_err(err)?,
            vs_port: fvs.optional_num(Field::VsPort.as_str()).map_err(err)?,
        };
        if entry.status().is_none() {
            return Err(TableError::invalid_entry(
                Self::TABLE,
                format!("inconsistent fields: {}", entry),
            ));
        }
        Ok(entry)
    }
}

impl fmt::Display for AssociationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = |v: Option<u64>| v.map(format_id).unwrap_or_else(|| "-".to_string());
        let port = |v: Option<u32>| v.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "vm_id={} vm_port={} ct_id={} dp_id={} dp_port={} vs_id={} vs_port={}",
            id(self.vm_id),
            port(self.vm_port),
            self.ct_id.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            id(self.dp_id),
            port(self.dp_port),
            id(self.vs_id),
            port(self.vs_port),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rf_protocol::field_values;

    fn mac() -> MacAddress {
        "02:a0:00:00:00:01".parse().unwrap()
    }

    fn active() -> AssociationEntry {
        let mut entry = AssociationEntry::idle_vm(0x1, 0, Some(mac()));
        entry.associate_dp(1, 0x10, 2).unwrap();
        entry.activate(9, 4).unwrap();
        entry
    }

    #[test]
    fn test_lifecycle_from_vm_side() {
        let mut entry = AssociationEntry::idle_vm(0x1, 0, Some(mac()));
        assert_eq!(entry.status(), Some(AssociationStatus::IdleVmPort));

        entry.associate_dp(1, 0x10, 2).unwrap();
        assert_eq!(entry.status(), Some(AssociationStatus::Associated));

        entry.activate(9, 4).unwrap();
        assert_eq!(entry.status(), Some(AssociationStatus::Active));
    }

    #[test]
    fn test_lifecycle_from_dp_side() {
        let mut entry = AssociationEntry::idle_dp(1, 0x10, 2);
        assert_eq!(entry.status(), Some(AssociationStatus::IdleDpPort));
        entry.associate_vm(0x1, 0, Some(mac())).unwrap();
        assert_eq!(entry.status(), Some(AssociationStatus::Associated));
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let mut idle = AssociationEntry::idle_vm(0x1, 0, None);
        assert!(idle.activate(9, 4).is_err());
        assert!(idle.associate_vm(0x2, 0, None).is_err());
        assert!(idle.make_idle_vm().is_err());

        let mut entry = active();
        assert!(entry.associate_dp(2, 0x20, 1).is_err());
        assert!(entry.activate(9, 5).is_err());
    }

    #[test]
    fn test_make_idle_vm_clears_dp_and_vs() {
        let mut entry = active();
        entry.make_idle_vm().unwrap();
        assert_eq!(entry.status(), Some(AssociationStatus::IdleVmPort));
        assert_eq!(entry.vs_id, None);
        assert_eq!(entry.dp_id, None);
        assert_eq!(entry.eth_addr, Some(mac()));
    }

    #[test]
    fn test_invalid_combinations() {
        let vs_only = AssociationEntry {
            vs_id: Some(9),
            vs_port: Some(4),
            ..Default::default()
        };
        assert_eq!(vs_only.status(), None);

        let half_dp = AssociationEntry {
            ct_id: Some(1),
            dp_id: Some(0x10),
            ..Default::default()
        };
        assert_eq!(half_dp.status(), None);
        assert_eq!(AssociationEntry::default().status(), None);
    }

    #[test]
    fn test_round_trip_all_states() {
        let mut associated = AssociationEntry::idle_dp(1, 0x10, 2);
        associated.associate_vm(0x1, 0, None).unwrap();
        let entries = [
            AssociationEntry::idle_vm(0x1, 0, Some(mac())),
            AssociationEntry::idle_dp(1, 0x10, 2),
            associated,
            active(),
        ];

        for original in entries {
            let mut original = original;
            original.set_entry_id(EntryId::new("7"));
            let restored =
                AssociationEntry::from_fields(EntryId::new("7"), &original.to_fields()).unwrap();
            assert_eq!(restored, original);
            assert_eq!(restored.status(), original.status());
        }
    }

    #[test]
    fn test_serialized_form_uses_empty_for_unset() {
        let fvs = AssociationEntry::idle_dp(1, 16, 2).to_fields();
        let expected: FieldValues = field_values! {
            "vm_id" => "",
            "vm_port" => "",
            "ct_id" => "1",
            "dp_id" => "16",
            "dp_port" => "2",
            "vs_id" => "",
            "vs_port" => "",
            "eth_addr" => "",
        };
        assert_eq!(fvs, expected);
    }

    #[test]
    fn test_from_fields_rejects_inconsistent_rows() {
        let fvs: FieldValues = field_values! { "vs_id" => "9", "vs_port" => "4" };
        assert!(matches!(
            AssociationEntry::from_fields(EntryId::new("1"), &fvs),
            Err(TableError::InvalidEntry { .. })
        ));

        let bad: FieldValues = field_values! { "vm_id" => "x", "vm_port" => "0" };
        assert!(AssociationEntry::from_fields(EntryId::new("1"), &bad).is_err());
    }
}
