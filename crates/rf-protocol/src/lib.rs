//! RouteFlow IPC message catalog.
//!
//! Every message exchanged between the virtual router agents, the server and
//! the controller proxies has two forms:
//!
//! - a typed in-memory form ([`Message`] and its payload structs), and
//! - a flat, all-string field list ([`FieldValues`]) used on the wire.
//!
//! Decoding is strict: a payload with an unknown kind, a missing field or an
//! unparsable value is rejected with a [`ProtocolError`] and never produces
//! a partially filled message.
//!
//! Route modifications ([`RouteMod`]) carry ordered match/action/option
//! lists ([`Match`], [`Action`], [`RouteOption`]). Kind codes with the most
//! significant bit set are optional; see [`is_optional_kind`].

mod envelope;
mod error;
mod fields;
mod message;
mod route_mod;
mod tlv;

pub use envelope::{Envelope, CHANNEL_FIELD, FROM_FIELD, TO_FIELD, TYPE_FIELD};
pub use error::{FieldError, ProtocolError, Result};
pub use fields::{FieldValue, FieldValues, FieldValuesExt};
pub use message::{
    DataPlaneMap, DatapathDown, DatapathPortRegister, Message, MessageKind, PortConfig,
    PortConfigOp, PortRegister, VirtualPlaneMap,
};
pub use route_mod::{RouteMod, RouteModOp};
pub use tlv::{action_kind, is_optional_kind, match_kind, option_kind, Action, Match, RouteOption};

/// Well-known service ids and channel names.
pub mod defaults {
    /// Service id of the coordination server.
    pub const RFSERVER_ID: &str = "rfserver";
    /// Channel between the virtual router agents and the server.
    pub const RFCLIENT_RFSERVER_CHANNEL: &str = "rfclient<->rfserver";
    /// Channel between the server and the controller proxies.
    pub const RFSERVER_RFPROXY_CHANNEL: &str = "rfserver<->rfproxy";
}
