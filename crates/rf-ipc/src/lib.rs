//! Channel-based IPC between RouteFlow components.
//!
//! A service is addressed by its id. [`IpcService::send`] publishes a
//! message on a named channel to one recipient; [`IpcService::listen`]
//! starts a worker that receives messages addressed to this service on one
//! channel and forwards them, decoded, into a bounded queue.
//!
//! The transport is at-least-once. Payloads that fail to decode are logged
//! and dropped by the listener; they never reach the queue and never stop
//! the worker.

mod error;
mod listener;
mod memory;
#[cfg(feature = "redis")]
mod redis_ipc;

pub use error::{IpcError, Result};
pub use listener::{ListenerHandle, MessageSink};
pub use memory::{MemoryBus, MemoryIpc};
#[cfg(feature = "redis")]
pub use redis_ipc::{RedisIpc, RedisIpcConfig};

use async_trait::async_trait;
use rf_protocol::Message;

/// A participant on the IPC transport.
#[async_trait]
pub trait IpcService: Send + Sync {
    /// Id other services use to address this one.
    fn id(&self) -> &str;

    /// Sends `message` to `to` over `channel`.
    async fn send(&self, channel: &str, to: &str, message: &Message) -> Result<()>;

    /// Starts receiving messages addressed to this service on `channel`.
    async fn listen(&self, channel: &str, sink: MessageSink) -> Result<ListenerHandle>;
}
