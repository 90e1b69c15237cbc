//! Match, action and option entries of a route modification.
//!
//! On the wire each entry is a `(type, value)` pair of strings. Kinds the
//! server interprets are decoded into typed variants; every other kind is
//! kept verbatim as `Other` so the translator can decide whether it may be
//! skipped.

use crate::error::{ProtocolError, Result};
use rf_types::{parse_id, Ipv4Prefix, MacAddress};
use std::fmt;

/// Match kind codes.
pub mod match_kind {
    pub const IPV4: u8 = 1;
    pub const IPV6: u8 = 2;
    pub const ETHERNET: u8 = 3;
    pub const MPLS: u8 = 4;
    pub const ETHERTYPE: u8 = 5;
    pub const NW_PROTO: u8 = 6;
    pub const TP_SRC: u8 = 7;
    pub const TP_DST: u8 = 8;
    pub const IN_PORT: u8 = 254;
    pub const VLAN: u8 = 255;
}

/// Action kind codes.
pub mod action_kind {
    pub const OUTPUT: u8 = 1;
    pub const SET_ETH_SRC: u8 = 2;
    pub const SET_ETH_DST: u8 = 3;
    pub const PUSH_MPLS: u8 = 4;
    pub const POP_MPLS: u8 = 5;
    pub const SWAP_MPLS: u8 = 6;
    pub const DROP: u8 = 254;
    pub const SFLOW: u8 = 255;
}

/// Option kind codes.
pub mod option_kind {
    pub const PRIORITY: u8 = 1;
    pub const IDLE_TIMEOUT: u8 = 2;
    pub const HARD_TIMEOUT: u8 = 3;
    pub const CT_ID: u8 = 255;
}

/// Returns true if a kind with this code may be ignored by a receiver that
/// does not implement it.
pub const fn is_optional_kind(code: u8) -> bool {
    code & 0x80 != 0
}

fn parse_value<T: TryFrom<u64>>(what: &'static str, index: usize, raw: &str) -> Result<T> {
    parse_id(raw)
        .ok()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| ProtocolError::invalid_tlv(what, index, format!("bad number '{}'", raw)))
}

fn parse_mac(what: &'static str, index: usize, raw: &str) -> Result<MacAddress> {
    raw.parse()
        .map_err(|e| ProtocolError::invalid_tlv(what, index, format!("{}", e)))
}

/// A single match predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Match {
    /// IPv4 destination network.
    Ipv4(Ipv4Prefix),
    /// Ethernet destination address.
    Ethernet(MacAddress),
    Ethertype(u16),
    NwProto(u8),
    TpSrc(u16),
    TpDst(u16),
    /// Ingress port on the target datapath.
    InPort(u32),
    /// A kind the server carries but does not interpret.
    Other { kind: u8, value: String },
}

impl Match {
    pub fn kind(&self) -> u8 {
        match self {
            Match::Ipv4(_) => match_kind::IPV4,
            Match::Ethernet(_) => match_kind::ETHERNET,
            Match::Ethertype(_) => match_kind::ETHERTYPE,
            Match::NwProto(_) => match_kind::NW_PROTO,
            Match::TpSrc(_) => match_kind::TP_SRC,
            Match::TpDst(_) => match_kind::TP_DST,
            Match::InPort(_) => match_kind::IN_PORT,
            Match::Other { kind, .. } => *kind,
        }
    }

    pub fn value(&self) -> String {
        match self {
            Match::Ipv4(prefix) => prefix.to_string(),
            Match::Ethernet(mac) => mac.to_string(),
            Match::Ethertype(v) | Match::TpSrc(v) | Match::TpDst(v) => v.to_string(),
            Match::NwProto(v) => v.to_string(),
            Match::InPort(v) => v.to_string(),
            Match::Other { value, .. } => value.clone(),
        }
    }

    /// Decodes the `index`-th match of a payload.
    pub fn from_parts(index: usize, kind: u8, value: &str) -> Result<Self> {
        const WHAT: &str = "match";
        Ok(match kind {
            match_kind::IPV4 => Match::Ipv4(
                value
                    .parse()
                    .map_err(|e| ProtocolError::invalid_tlv(WHAT, index, format!("{}", e)))?,
            ),
            match_kind::ETHERNET => Match::Ethernet(parse_mac(WHAT, index, value)?),
            match_kind::ETHERTYPE => Match::Ethertype(parse_value(WHAT, index, value)?),
            match_kind::NW_PROTO => Match::NwProto(parse_value(WHAT, index, value)?),
            match_kind::TP_SRC => Match::TpSrc(parse_value(WHAT, index, value)?),
            match_kind::TP_DST => Match::TpDst(parse_value(WHAT, index, value)?),
            match_kind::IN_PORT => Match::InPort(parse_value(WHAT, index, value)?),
            other => {
                log::debug!("Carrying uninterpreted match kind {} at index {}", other, index);
                Match::Other {
                    kind: other,
                    value: value.to_string(),
                }
            }
        })
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match({}={})", self.kind(), self.value())
    }
}

/// A single action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Output(u32),
    SetEthSrc(MacAddress),
    SetEthDst(MacAddress),
    Other { kind: u8, value: String },
}

impl Action {
    pub fn kind(&self) -> u8 {
        match self {
            Action::Output(_) => action_kind::OUTPUT,
            Action::SetEthSrc(_) => action_kind::SET_ETH_SRC,
            Action::SetEthDst(_) => action_kind::SET_ETH_DST,
            Action::Other { kind, .. } => *kind,
        }
    }

    pub fn value(&self) -> String {
        match self {
            Action::Output(port) => port.to_string(),
            Action::SetEthSrc(mac) | Action::SetEthDst(mac) => mac.to_string(),
            Action::Other { value, .. } => value.clone(),
        }
    }

    pub fn from_parts(index: usize, kind: u8, value: &str) -> Result<Self> {
        const WHAT: &str = "action";
        Ok(match kind {
            action_kind::OUTPUT => Action::Output(parse_value(WHAT, index, value)?),
            action_kind::SET_ETH_SRC => Action::SetEthSrc(parse_mac(WHAT, index, value)?),
            action_kind::SET_ETH_DST => Action::SetEthDst(parse_mac(WHAT, index, value)?),
            other => {
                log::debug!("Carrying uninterpreted action kind {} at index {}", other, index);
                Action::Other {
                    kind: other,
                    value: value.to_string(),
                }
            }
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action({}={})", self.kind(), self.value())
    }
}

/// A single route option.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteOption {
    Priority(u16),
    IdleTimeout(u16),
    HardTimeout(u16),
    /// Controller that owns the target datapath.
    CtId(u64),
    Other { kind: u8, value: String },
}

impl RouteOption {
    pub fn kind(&self) -> u8 {
        match self {
            RouteOption::Priority(_) => option_kind::PRIORITY,
            RouteOption::IdleTimeout(_) => option_kind::IDLE_TIMEOUT,
            RouteOption::HardTimeout(_) => option_kind::HARD_TIMEOUT,
            RouteOption::CtId(_) => option_kind::CT_ID,
            RouteOption::Other { kind, .. } => *kind,
        }
    }

    pub fn value(&self) -> String {
        match self {
            RouteOption::Priority(v) | RouteOption::IdleTimeout(v) | RouteOption::HardTimeout(v) => {
                v.to_string()
            }
            RouteOption::CtId(ct) => ct.to_string(),
            RouteOption::Other { value, .. } => value.clone(),
        }
    }

    pub fn from_parts(index: usize, kind: u8, value: &str) -> Result<Self> {
        const WHAT: &str = "option";
        Ok(match kind {
            option_kind::PRIORITY => RouteOption::Priority(parse_value(WHAT, index, value)?),
            option_kind::IDLE_TIMEOUT => RouteOption::IdleTimeout(parse_value(WHAT, index, value)?),
            option_kind::HARD_TIMEOUT => RouteOption::HardTimeout(parse_value(WHAT, index, value)?),
            option_kind::CT_ID => RouteOption::CtId(parse_value(WHAT, index, value)?),
            other => {
                log::debug!("Carrying uninterpreted option kind {} at index {}", other, index);
                RouteOption::Other {
                    kind: other,
                    value: value.to_string(),
                }
            }
        })
    }
}

impl fmt::Display for RouteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "option({}={})", self.kind(), self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_optional_kind_bit() {
        assert!(!is_optional_kind(match_kind::IPV4));
        assert!(!is_optional_kind(match_kind::IPV6));
        assert!(is_optional_kind(match_kind::IN_PORT));
        assert!(is_optional_kind(match_kind::VLAN));
        assert!(is_optional_kind(action_kind::SFLOW));
        assert!(is_optional_kind(option_kind::CT_ID));
    }

    #[test]
    fn test_match_decode_typed() {
        assert_eq!(
            Match::from_parts(0, match_kind::IPV4, "10.0.0.0/24").unwrap(),
            Match::Ipv4("10.0.0.0/24".parse().unwrap())
        );
        assert_eq!(
            Match::from_parts(1, match_kind::ETHERTYPE, "0x0806").unwrap(),
            Match::Ethertype(0x0806)
        );
        assert_eq!(
            Match::from_parts(2, match_kind::TP_DST, "179").unwrap(),
            Match::TpDst(179)
        );
    }

    #[test]
    fn test_uninterpreted_kinds_are_carried() {
        let m = Match::from_parts(0, match_kind::IPV6, "2001:db8::/32").unwrap();
        assert_eq!(m.kind(), match_kind::IPV6);
        assert_eq!(m.value(), "2001:db8::/32");

        let a = Action::from_parts(0, action_kind::PUSH_MPLS, "100").unwrap();
        assert_eq!(
            a,
            Action::Other {
                kind: action_kind::PUSH_MPLS,
                value: "100".to_string()
            }
        );
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(Match::from_parts(0, match_kind::NW_PROTO, "300").is_err());
        assert!(Match::from_parts(0, match_kind::IPV4, "10.0.0.0").is_err());
        assert!(Action::from_parts(3, action_kind::SET_ETH_DST, "zz").is_err());
        assert!(RouteOption::from_parts(0, option_kind::PRIORITY, "").is_err());

        let err = Action::from_parts(3, action_kind::OUTPUT, "port").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::invalid_tlv("action", 3, "bad number 'port'")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Action::Output(2).to_string(), "action(1=2)");
        assert_eq!(RouteOption::CtId(7).to_string(), "option(255=7)");
    }
}
