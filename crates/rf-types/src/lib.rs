//! Common RouteFlow types shared by the control-plane crates.
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`Ipv4Address`] / [`Ipv4Prefix`]: IPv4 destinations for route matches
//! - [`parse_id`] / [`format_id`]: 64-bit VM and datapath identifiers

mod id;
mod ip;
mod mac;

pub use id::{format_id, parse_id, parse_id_hex};
pub use ip::{Ipv4Address, Ipv4Prefix};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
