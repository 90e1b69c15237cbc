//! Listener workers shared by the transports.

use log::{debug, warn};
use rf_protocol::{Envelope, FieldValues};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bounded queue that listener workers feed.
pub type MessageSink = mpsc::Sender<Envelope>;

/// Handle to a running listener worker.
#[derive(Debug)]
pub struct ListenerHandle {
    channel: String,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(channel: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            channel: channel.into(),
            task,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the worker. Messages already queued stay in the sink.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Outcome of handing one raw payload to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    Dropped,
    SinkClosed,
}

/// Decodes a raw payload and forwards it if it is addressed to `own_id`
/// on `channel`.
pub(crate) async fn deliver(
    own_id: &str,
    channel: &str,
    raw: &FieldValues,
    sink: &MessageSink,
) -> Delivery {
    let envelope = match Envelope::decode(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("{}: dropping malformed payload on {}: {}", own_id, channel, e);
            return Delivery::Dropped;
        }
    };

    if envelope.to != own_id || envelope.channel != channel {
        debug!(
            "{}: ignoring {} for {} on {}",
            own_id,
            envelope.message.kind(),
            envelope.to,
            envelope.channel
        );
        return Delivery::Dropped;
    }

    match sink.send(envelope).await {
        Ok(()) => Delivery::Delivered,
        Err(_) => Delivery::SinkClosed,
    }
}
