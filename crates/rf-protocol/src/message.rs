//! Typed message catalog.

use crate::error::{FieldError, ProtocolError, Result};
use crate::fields::{FieldValues, FieldValuesExt};
use crate::route_mod::RouteMod;
use rf_types::MacAddress;
use std::fmt;

/// Message kinds and their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    PortRegister = 0,
    PortConfig = 1,
    DatapathPortRegister = 2,
    DatapathDown = 3,
    VirtualPlaneMap = 4,
    DataPlaneMap = 5,
    RouteMod = 6,
}

impl MessageKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => MessageKind::PortRegister,
            1 => MessageKind::PortConfig,
            2 => MessageKind::DatapathPortRegister,
            3 => MessageKind::DatapathDown,
            4 => MessageKind::VirtualPlaneMap,
            5 => MessageKind::DataPlaneMap,
            6 => MessageKind::RouteMod,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::PortRegister => "PortRegister",
            MessageKind::PortConfig => "PortConfig",
            MessageKind::DatapathPortRegister => "DatapathPortRegister",
            MessageKind::DatapathDown => "DatapathDown",
            MessageKind::VirtualPlaneMap => "VirtualPlaneMap",
            MessageKind::DataPlaneMap => "DataPlaneMap",
            MessageKind::RouteMod => "RouteMod",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A virtual router agent announces one of its interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRegister {
    pub vm_id: u64,
    pub vm_port: u32,
    pub hwaddress: MacAddress,
}

/// Operation requested by a [`PortConfig`] command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortConfigOp {
    /// Ask the agent to map its port onto the overlay switch.
    MapRequest = 0,
    /// The datapath side is gone; the agent must forget the mapping.
    Reset = 1,
    MapSuccess = 2,
}

impl PortConfigOp {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PortConfigOp::MapRequest),
            1 => Some(PortConfigOp::Reset),
            2 => Some(PortConfigOp::MapSuccess),
            _ => None,
        }
    }
}

/// Command sent to a virtual router agent about one of its ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub vm_id: u64,
    pub vm_port: u32,
    pub operation: PortConfigOp,
}

/// A controller proxy announces a switch port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatapathPortRegister {
    pub ct_id: u64,
    pub dp_id: u64,
    pub dp_port: u32,
}

/// A controller proxy reports that a switch disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatapathDown {
    pub ct_id: u64,
    pub dp_id: u64,
}

/// A virtual router port was attached to an overlay switch port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPlaneMap {
    pub vm_id: u64,
    pub vm_port: u32,
    pub vs_id: u64,
    pub vs_port: u32,
}

/// Tells a controller proxy which overlay port carries a switch port's traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPlaneMap {
    pub ct_id: u64,
    pub dp_id: u64,
    pub dp_port: u32,
    pub vs_id: u64,
    pub vs_port: u32,
}

/// Any message of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    PortRegister(PortRegister),
    PortConfig(PortConfig),
    DatapathPortRegister(DatapathPortRegister),
    DatapathDown(DatapathDown),
    VirtualPlaneMap(VirtualPlaneMap),
    DataPlaneMap(DataPlaneMap),
    RouteMod(RouteMod),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::PortRegister(_) => MessageKind::PortRegister,
            Message::PortConfig(_) => MessageKind::PortConfig,
            Message::DatapathPortRegister(_) => MessageKind::DatapathPortRegister,
            Message::DatapathDown(_) => MessageKind::DatapathDown,
            Message::VirtualPlaneMap(_) => MessageKind::VirtualPlaneMap,
            Message::DataPlaneMap(_) => MessageKind::DataPlaneMap,
            Message::RouteMod(_) => MessageKind::RouteMod,
        }
    }

    /// Encodes the payload fields (without envelope fields).
    pub fn to_fields(&self) -> FieldValues {
        let mut fvs = FieldValues::new();
        if let Message::RouteMod(rm) = self {
            rm.encode_into(&mut fvs);
            return fvs;
        }

        let mut put = |field: &str, value: String| fvs.push((field.to_string(), value));
        match self {
            Message::PortRegister(m) => {
                put("vm_id", m.vm_id.to_string());
                put("vm_port", m.vm_port.to_string());
                put("hwaddress", m.hwaddress.to_string());
            }
            Message::PortConfig(m) => {
                put("vm_id", m.vm_id.to_string());
                put("vm_port", m.vm_port.to_string());
                put("operation_id", (m.operation as u8).to_string());
            }
            Message::DatapathPortRegister(m) => {
                put("ct_id", m.ct_id.to_string());
                put("dp_id", m.dp_id.to_string());
                put("dp_port", m.dp_port.to_string());
            }
            Message::DatapathDown(m) => {
                put("ct_id", m.ct_id.to_string());
                put("dp_id", m.dp_id.to_string());
            }
            Message::VirtualPlaneMap(m) => {
                put("vm_id", m.vm_id.to_string());
                put("vm_port", m.vm_port.to_string());
                put("vs_id", m.vs_id.to_string());
                put("vs_port", m.vs_port.to_string());
            }
            Message::DataPlaneMap(m) => {
                put("ct_id", m.ct_id.to_string());
                put("dp_id", m.dp_id.to_string());
                put("dp_port", m.dp_port.to_string());
                put("vs_id", m.vs_id.to_string());
                put("vs_port", m.vs_port.to_string());
            }
            Message::RouteMod(_) => {}
        }
        fvs
    }

    /// Decodes a payload of the given kind.
    pub fn from_fields(kind: MessageKind, fvs: &FieldValues) -> Result<Self> {
        Ok(match kind {
            MessageKind::PortRegister => Message::PortRegister(PortRegister {
                vm_id: fvs.require_num("vm_id")?,
                vm_port: fvs.require_num("vm_port")?,
                hwaddress: fvs.require_mac("hwaddress")?,
            }),
            MessageKind::PortConfig => {
                let code: u8 = fvs.require_num("operation_id")?;
                let operation = PortConfigOp::from_code(code)
                    .ok_or_else(|| FieldError::invalid("operation_id", code.to_string()))?;
                Message::PortConfig(PortConfig {
                    vm_id: fvs.require_num("vm_id")?,
                    vm_port: fvs.require_num("vm_port")?,
                    operation,
                })
            }
            MessageKind::DatapathPortRegister => {
                Message::DatapathPortRegister(DatapathPortRegister {
                    ct_id: fvs.require_num("ct_id")?,
                    dp_id: fvs.require_num("dp_id")?,
                    dp_port: fvs.require_num("dp_port")?,
                })
            }
            MessageKind::DatapathDown => Message::DatapathDown(DatapathDown {
                ct_id: fvs.require_num("ct_id")?,
                dp_id: fvs.require_num("dp_id")?,
            }),
            MessageKind::VirtualPlaneMap => Message::VirtualPlaneMap(VirtualPlaneMap {
                vm_id: fvs.require_num("vm_id")?,
                vm_port: fvs.require_num("vm_port")?,
                vs_id: fvs.require_num("vs_id")?,
                vs_port: fvs.require_num("vs_port")?,
            }),
            MessageKind::DataPlaneMap => Message::DataPlaneMap(DataPlaneMap {
                ct_id: fvs.require_num("ct_id")?,
                dp_id: fvs.require_num("dp_id")?,
                dp_port: fvs.require_num("dp_port")?,
                vs_id: fvs.require_num("vs_id")?,
                vs_port: fvs.require_num("vs_port")?,
            }),
            MessageKind::RouteMod => Message::RouteMod(RouteMod::decode(fvs)?),
        })
    }

    /// Decodes a payload whose kind is given as a raw wire string.
    pub fn from_raw(kind: &str, fvs: &FieldValues) -> Result<Self> {
        let kind = kind
            .parse::<u8>()
            .ok()
            .and_then(MessageKind::from_code)
            .ok_or_else(|| ProtocolError::UnknownKind(kind.to_string()))?;
        Self::from_fields(kind, fvs)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::RouteMod(rm) => rm.fmt(f),
            other => {
                write!(f, "{}(", other.kind())?;
                for (i, (field, value)) in other.to_fields().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", field, value)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_values;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_codes() {
        for code in 0..=6u8 {
            let kind = MessageKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(MessageKind::from_code(7), None);
    }

    #[test]
    fn test_port_register_decode() {
        let fvs: FieldValues = field_values! {
            "vm_id" => "1",
            "vm_port" => "0",
            "hwaddress" => "02:a0:00:00:00:01",
        };
        assert_eq!(
            Message::from_raw("0", &fvs).unwrap(),
            Message::PortRegister(PortRegister {
                vm_id: 1,
                vm_port: 0,
                hwaddress: "02:a0:00:00:00:01".parse().unwrap(),
            })
        );
    }

    #[test]
    fn test_port_config_encoding() {
        let msg = Message::PortConfig(PortConfig {
            vm_id: 0x12a0a0a0a0,
            vm_port: 3,
            operation: PortConfigOp::Reset,
        });
        let expected: FieldValues = field_values! {
            "vm_id" => 0x12a0a0a0a0u64,
            "vm_port" => "3",
            "operation_id" => "1",
        };
        assert_eq!(msg.to_fields(), expected);
        assert_eq!(Message::from_fields(MessageKind::PortConfig, &expected).unwrap(), msg);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let fvs = FieldValues::new();
        assert_eq!(
            Message::from_raw("42", &fvs),
            Err(ProtocolError::UnknownKind("42".to_string()))
        );
        assert_eq!(
            Message::from_raw("route", &fvs),
            Err(ProtocolError::UnknownKind("route".to_string()))
        );
    }

    #[test]
    fn test_missing_and_invalid_fields_rejected() {
        let missing: FieldValues = field_values! { "ct_id" => "1" };
        assert_eq!(
            Message::from_fields(MessageKind::DatapathDown, &missing),
            Err(ProtocolError::Field(FieldError::missing("dp_id")))
        );

        let invalid: FieldValues = field_values! {
            "ct_id" => "1",
            "dp_id" => "16",
            "dp_port" => "-2",
        };
        assert_eq!(
            Message::from_fields(MessageKind::DatapathPortRegister, &invalid),
            Err(ProtocolError::Field(FieldError::invalid("dp_port", "-2")))
        );
    }

    #[test]
    fn test_display() {
        let msg = Message::DatapathDown(DatapathDown { ct_id: 1, dp_id: 16 });
        assert_eq!(msg.to_string(), "DatapathDown(ct_id=1, dp_id=16)");
    }
}
