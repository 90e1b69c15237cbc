//! One-time datapath configuration.
//!
//! Every datapath receives an ordered list of default flows the first time
//! one of its ports registers. Regular switches get the protocol punt rules
//! that keep the virtual routers' control plane alive; the overlay switch
//! only gets a single rule sending everything to the controller.

use rf_protocol::{Action, Match, RouteMod, RouteModOp, RouteOption};
use rf_types::{Ipv4Address, Ipv4Prefix};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output port that punts packets to the controller.
pub const CONTROLLER_PORT: u32 = 0xffff_fffd;

pub const PRIORITY_LOWEST: u16 = 0x0000;
pub const PRIORITY_BAND: u16 = 0x000a;
pub const PRIORITY_HIGH: u16 = 0x8020;

/// Upper 32 bits of the overlay switch datapath id ("rfvs").
pub const RFVS_PREFIX: u32 = 0x7266_7673;

const ETHERTYPE_IP: u16 = 0x0800;
const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_VM_INFO: u16 = 0x0a0a;

const IPPROTO_ICMP: u8 = 0x01;
const IPPROTO_TCP: u8 = 0x06;
const IPPROTO_UDP: u8 = 0x11;
const IPPROTO_OSPF: u8 = 0x59;

const TPORT_BGP: u16 = 179;
const TPORT_LDP: u16 = 646;

/// True if `dp_id` belongs to the overlay switch.
pub fn is_rfvs(dp_id: u64, prefix: u32) -> bool {
    dp_id >> 32 == u64::from(prefix)
}

/// A default flow installed once per datapath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultFlow {
    ClearFlowTable,
    DropAll,
    Ospf,
    BgpPassive,
    BgpActive,
    Ripv2,
    Arp,
    Icmp,
    LdpPassive,
    LdpActive,
    VmInfo,
    /// Everything to the controller, for the overlay switch.
    All,
}

impl DefaultFlow {
    /// The list sent to every regular datapath unless configured otherwise.
    pub const STANDARD: [DefaultFlow; 10] = [
        DefaultFlow::ClearFlowTable,
        DefaultFlow::DropAll,
        DefaultFlow::Ospf,
        DefaultFlow::BgpPassive,
        DefaultFlow::BgpActive,
        DefaultFlow::Ripv2,
        DefaultFlow::Arp,
        DefaultFlow::Icmp,
        DefaultFlow::LdpPassive,
        DefaultFlow::LdpActive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DefaultFlow::ClearFlowTable => "clear_flow_table",
            DefaultFlow::DropAll => "drop_all",
            DefaultFlow::Ospf => "ospf",
            DefaultFlow::BgpPassive => "bgp_passive",
            DefaultFlow::BgpActive => "bgp_active",
            DefaultFlow::Ripv2 => "ripv2",
            DefaultFlow::Arp => "arp",
            DefaultFlow::Icmp => "icmp",
            DefaultFlow::LdpPassive => "ldp_passive",
            DefaultFlow::LdpActive => "ldp_active",
            DefaultFlow::VmInfo => "vm_info",
            DefaultFlow::All => "all",
        }
    }

    /// Builds the route modification for datapath `dp_id`.
    ///
    /// The controller tag is added by the sender.
    pub fn route_mod(self, dp_id: u64) -> RouteMod {
        match self {
            DefaultFlow::ClearFlowTable => RouteMod::new(RouteModOp::Delete, dp_id)
                .with_option(RouteOption::Priority(PRIORITY_LOWEST)),
            DefaultFlow::DropAll => RouteMod::new(RouteModOp::Add, dp_id)
                .with_option(RouteOption::Priority(PRIORITY_BAND)),
            DefaultFlow::All => punt(dp_id),
            DefaultFlow::Ospf => ip_proto(dp_id, IPPROTO_OSPF),
            DefaultFlow::BgpPassive => {
                ip_proto(dp_id, IPPROTO_TCP).with_match(Match::TpDst(TPORT_BGP))
            }
            DefaultFlow::BgpActive => {
                ip_proto(dp_id, IPPROTO_TCP).with_match(Match::TpSrc(TPORT_BGP))
            }
            DefaultFlow::Ripv2 => ip_proto(dp_id, IPPROTO_UDP).with_match(Match::Ipv4(
                Ipv4Prefix::host(Ipv4Address::new(224, 0, 0, 9)),
            )),
            DefaultFlow::Arp => punt(dp_id).with_match(Match::Ethertype(ETHERTYPE_ARP)),
            DefaultFlow::Icmp => ip_proto(dp_id, IPPROTO_ICMP),
            DefaultFlow::LdpPassive => {
                ip_proto(dp_id, IPPROTO_TCP).with_match(Match::TpDst(TPORT_LDP))
            }
            DefaultFlow::LdpActive => {
                ip_proto(dp_id, IPPROTO_TCP).with_match(Match::TpSrc(TPORT_LDP))
            }
            DefaultFlow::VmInfo => punt(dp_id).with_match(Match::Ethertype(ETHERTYPE_VM_INFO)),
        }
    }
}

impl fmt::Display for DefaultFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn punt(dp_id: u64) -> RouteMod {
    RouteMod::new(RouteModOp::Add, dp_id)
        .with_action(Action::Output(CONTROLLER_PORT))
        .with_option(RouteOption::Priority(PRIORITY_HIGH))
}

fn ip_proto(dp_id: u64, proto: u8) -> RouteMod {
    punt(dp_id)
        .with_match(Match::Ethertype(ETHERTYPE_IP))
        .with_match(Match::NwProto(proto))
}
