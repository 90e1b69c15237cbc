//! Wire-ready flow attributes.

use crate::error::Result;
use rf_types::{format_id, Ipv4Prefix, MacAddress};
use std::fmt;

/// Flow table command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowCommand {
    Add,
    Delete,
}

/// Flow entry expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeout {
    #[default]
    Permanent,
    ExpiresAfter(u16),
}

impl Timeout {
    pub fn from_secs(secs: u16) -> Self {
        match secs {
            0 => Timeout::Permanent,
            n => Timeout::ExpiresAfter(n),
        }
    }

    pub fn as_secs(self) -> u16 {
        match self {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(n) => n,
        }
    }
}

/// Output port of a forwarding action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputPort {
    Physical(u32),
    /// Send to the controller (OpenFlow reserved port `0xfffffffd`).
    Controller,
}

impl OutputPort {
    pub const CONTROLLER_PORT: u32 = 0xffff_fffd;

    pub fn from_port(port: u32) -> Self {
        match port {
            Self::CONTROLLER_PORT => OutputPort::Controller,
            n => OutputPort::Physical(n),
        }
    }
}

/// Match fields of a flow. `None` is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlowMatch {
    pub in_port: Option<u32>,
    pub dl_dst: Option<MacAddress>,
    pub dl_type: Option<u16>,
    pub nw_proto: Option<u8>,
    pub nw_dst: Option<Ipv4Prefix>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
}

impl FlowMatch {
    /// True if every field is wildcarded.
    pub fn is_wildcard(&self) -> bool {
        *self == FlowMatch::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowAction {
    Output(OutputPort),
    SetDlSrc(MacAddress),
    SetDlDst(MacAddress),
}

/// A fully translated flow for one datapath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSpec {
    pub datapath_id: u64,
    pub command: FlowCommand,
    pub pattern: FlowMatch,
    pub actions: Vec<FlowAction>,
    pub priority: u16,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    /// Controller that owns the datapath.
    pub controller: Option<u64>,
}

impl fmt::Display for FlowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} dp={} prio={:#06x} {:?} -> {:?}",
            self.command,
            format_id(self.datapath_id),
            self.priority,
            self.pattern,
            self.actions
        )
    }
}

/// Serializes flows into a switch protocol.
///
/// Implemented by the controller-side OpenFlow encoder.
pub trait FlowEncoder: Send + Sync {
    fn encode(&self, flow: &FlowSpec) -> Result<Vec<u8>>;
}
