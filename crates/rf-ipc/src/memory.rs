//! In-process transport.
//!
//! A [`MemoryBus`] connects any number of [`MemoryIpc`] services. Every
//! published payload is kept in a history so tests and tools can inspect
//! exactly what went over the wire.

use crate::error::{IpcError, Result};
use crate::listener::{deliver, Delivery, ListenerHandle, MessageSink};
use crate::IpcService;
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use rf_protocol::{Envelope, FieldValues, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<HashMap<String, Vec<(String, mpsc::UnboundedSender<FieldValues>)>>>,
    history: Mutex<Vec<FieldValues>>,
}

/// Shared in-memory message bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service attached to this bus.
    pub fn service(&self, id: impl Into<String>) -> MemoryIpc {
        MemoryIpc {
            id: id.into(),
            bus: self.clone(),
        }
    }

    /// Publishes a raw payload on `channel` as-is.
    pub fn publish_raw(&self, channel: &str, fvs: FieldValues) {
        self.inner.history.lock().push(fvs.clone());

        let mut subscribers = self.inner.subscribers.lock();
        if let Some(list) = subscribers.get_mut(channel) {
            list.retain(|(_, tx)| tx.send(fvs.clone()).is_ok());
        }
    }

    /// Every payload that decodes, in publish order.
    pub fn history(&self) -> Vec<Envelope> {
        self.inner
            .history
            .lock()
            .iter()
            .filter_map(|fvs| Envelope::decode(fvs).ok())
            .collect()
    }

    /// Every published payload, decodable or not.
    pub fn raw_history(&self) -> Vec<FieldValues> {
        self.inner.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.inner.history.lock().clear();
    }

    /// Number of live listeners on `channel`.
    pub fn listeners(&self, channel: &str) -> usize {
        self.inner
            .subscribers
            .lock()
            .get(channel)
            .map_or(0, |list| list.iter().filter(|(_, tx)| !tx.is_closed()).count())
    }

    fn subscribe(&self, id: &str, channel: &str) -> Result<mpsc::UnboundedReceiver<FieldValues>> {
        let mut subscribers = self.inner.subscribers.lock();
        let list = subscribers.entry(channel.to_string()).or_default();
        list.retain(|(_, tx)| !tx.is_closed());
        if list.iter().any(|(owner, _)| owner == id) {
            return Err(IpcError::AlreadyListening(channel.to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        list.push((id.to_string(), tx));
        Ok(rx)
    }
}

/// A service on a [`MemoryBus`].
#[derive(Clone)]
pub struct MemoryIpc {
    id: String,
    bus: MemoryBus,
}

impl MemoryIpc {
    pub fn bus(&self) -> &MemoryBus {
        &self.bus
    }
}

#[async_trait]
impl IpcService for MemoryIpc {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, channel: &str, to: &str, message: &Message) -> Result<()> {
        let envelope = Envelope::new(self.id.clone(), to, channel, message.clone());
        debug!("{} -> {} on {}: {}", self.id, to, channel, message);
        self.bus.publish_raw(channel, envelope.encode());
        Ok(())
    }

    async fn listen(&self, channel: &str, sink: MessageSink) -> Result<ListenerHandle> {
        let mut rx = self.bus.subscribe(&self.id, channel)?;
        let id = self.id.clone();
        let chan = channel.to_string();

        let task = tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                if deliver(&id, &chan, &raw, &sink).await == Delivery::SinkClosed {
                    debug!("{}: sink closed, stopping listener on {}", id, chan);
                    break;
                }
            }
        });
        Ok(ListenerHandle::new(channel, task))
    }
}
