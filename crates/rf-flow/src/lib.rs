//! Route modification translator.
//!
//! [`translate`] turns an abstract [`rf_protocol::RouteMod`] into a
//! [`FlowSpec`]: the flow attributes an OpenFlow encoder needs, with every
//! value already typed and checked. The translator is pure and keeps no
//! state.
//!
//! Kinds the translator does not implement are handled by their optional
//! bit: optional kinds are skipped, any other kind fails the whole
//! translation so that no partial flow is ever produced.

mod error;
mod spec;
mod translate;

pub use error::{Result, TranslateError};
pub use spec::{FlowAction, FlowCommand, FlowEncoder, FlowMatch, FlowSpec, OutputPort, Timeout};
pub use translate::{normalize, translate, DEFAULT_PRIORITY};
