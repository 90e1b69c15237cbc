//! The single-threaded dispatch loop.
//!
//! One listener worker per channel decodes inbound payloads and feeds a
//! shared bounded queue. Exactly one worker drains the queue and hands
//! each message to the engine, so state transitions never interleave.

use crate::error::Result;
use crate::server::RfServer;
use rf_ipc::{IpcService, ListenerHandle};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Counters of a finished dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Messages the engine applied.
    pub processed: u64,
    /// Messages whose processing failed.
    pub failed: u64,
}

pub struct Dispatcher {
    server: RfServer,
    ipc: Arc<dyn IpcService>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(server: RfServer, ipc: Arc<dyn IpcService>) -> Self {
        Self {
            server,
            ipc,
            stats: DispatchStats::default(),
        }
    }

    /// Listens on both channels and processes messages until `shutdown`
    /// resolves or every listener stops.
    ///
    /// On shutdown the listeners are stopped and messages already queued
    /// are still processed.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<DispatchStats> {
        let config = self.server.config();
        let channels = [
            config.server.client_channel.clone(),
            config.server.proxy_channel.clone(),
        ];
        let (tx, mut rx) = mpsc::channel(config.server.queue_depth);

        let mut listeners: Vec<ListenerHandle> = Vec::with_capacity(channels.len());
        for channel in &channels {
            match self.ipc.listen(channel, tx.clone()).await {
                Ok(handle) => listeners.push(handle),
                Err(e) => {
                    for handle in listeners {
                        handle.stop();
                    }
                    return Err(e.into());
                }
            }
            info!(id = self.ipc.id(), %channel, "listening");
        }
        drop(tx);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping listeners");
                    break;
                }
                envelope = rx.recv() => match envelope {
                    Some(envelope) => self.dispatch(envelope).await,
                    None => {
                        info!("all listeners stopped");
                        break;
                    }
                },
            }
        }

        for handle in listeners {
            debug!(channel = handle.channel(), "stopping listener");
            handle.stop();
        }
        rx.close();
        while let Some(envelope) = rx.recv().await {
            self.dispatch(envelope).await;
        }

        info!(
            processed = self.stats.processed,
            failed = self.stats.failed,
            "dispatcher stopped"
        );
        Ok(self.stats)
    }

    async fn dispatch(&mut self, envelope: rf_protocol::Envelope) {
        let kind = envelope.message.kind();
        let from = envelope.from.clone();
        match self.server.process(envelope).await {
            Ok(()) => self.stats.processed += 1,
            Err(e) => {
                self.stats.failed += 1;
                error!(kind = kind.as_str(), %from, error = %e, retryable = e.is_retryable(), "failed to process message");
            }
        }
    }
}
