//! RouteFlow coordination server.
//!
//! The server keeps virtual router ports, switch ports and overlay switch
//! ports associated, links switches over configured inter-switch links,
//! and turns the virtual routers' route modifications into flow
//! programming commands for every switch that needs them.
//!
//! - [`RfServer`]: the engine; one operation per inbound message kind.
//! - [`Dispatcher`]: feeds the engine from the IPC listeners, one message
//!   at a time.
//! - [`RfServerConfig`] / [`StaticConfig`]: daemon settings and the static
//!   port and link configuration, both loaded once at startup.

pub mod config;
pub mod defaults;
pub mod dispatcher;
pub mod error;
pub mod server;
pub mod static_config;
pub mod store;

pub use config::{Backend, RfServerConfig};
pub use defaults::DefaultFlow;
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{Result, ServerError};
pub use server::RfServer;
pub use static_config::StaticConfig;
pub use store::Tables;
