//! Redis list transport.
//!
//! A message for `<to>` on `<channel>` is pushed as a JSON field list onto
//! the list `<channel>:<to>`; the recipient's listener pops it with BLPOP.
//!
//! BLPOP holds its connection for up to the poll timeout, so every listener
//! polls on a connection of its own. The shared connection manager only
//! carries RPUSH.

use crate::error::{IpcError, Result};
use crate::listener::{deliver, Delivery, ListenerHandle, MessageSink};
use crate::IpcService;
use async_trait::async_trait;
use log::{debug, info, warn};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use rf_protocol::{Envelope, FieldValues, Message};
use std::time::Duration;

/// Connection settings for [`RedisIpc`].
#[derive(Debug, Clone)]
pub struct RedisIpcConfig {
    pub host: String,
    pub port: u16,
    pub db: u32,
    /// BLPOP timeout; bounds how long a stopped listener lingers.
    pub poll_timeout_secs: f64,
    /// Pause after a failed poll before retrying.
    pub retry_interval: Duration,
}

impl RedisIpcConfig {
    pub fn new(host: impl Into<String>, port: u16, db: u32) -> Self {
        Self {
            host: host.into(),
            port,
            db,
            poll_timeout_secs: 1.0,
            retry_interval: Duration::from_secs(1),
        }
    }

    fn uri(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

fn queue_key(channel: &str, to: &str) -> String {
    format!("{}:{}", channel, to)
}

/// A service communicating through Redis lists.
pub struct RedisIpc {
    id: String,
    config: RedisIpcConfig,
    client: redis::Client,
    connection: ConnectionManager,
}

impl RedisIpc {
    pub async fn connect(id: impl Into<String>, config: RedisIpcConfig) -> Result<Self> {
        let uri = config.uri();
        let client = redis::Client::open(uri.clone())
            .map_err(|e| IpcError::Transport(format!("{}: {}", uri, e)))?;
        let connection = client.get_connection_manager().await.map_err(|e| {
            IpcError::Transport(format!("failed to create connection manager: {}", e))
        })?;
        info!("IPC connected to Redis {}:{}", config.host, config.port);
        Ok(Self {
            id: id.into(),
            config,
            client,
            connection,
        })
    }
}

/// Opens a connection reserved for one listener's BLPOP loop.
async fn listener_connection(client: &redis::Client) -> Result<MultiplexedConnection> {
    client
        .get_multiplexed_tokio_connection()
        .await
        .map_err(|e| IpcError::Transport(format!("failed to open listener connection: {}", e)))
}

#[async_trait]
impl IpcService for RedisIpc {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, channel: &str, to: &str, message: &Message) -> Result<()> {
        let envelope = Envelope::new(self.id.clone(), to, channel, message.clone());
        let payload = serde_json::to_string(&envelope.encode())
            .map_err(|e| IpcError::Codec(e.to_string()))?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .rpush(queue_key(channel, to), payload)
            .await
            .map_err(|e| IpcError::Transport(format!("RPUSH failed: {}", e)))?;
        debug!("{} -> {} on {}: {}", self.id, to, channel, message);
        Ok(())
    }

    async fn listen(&self, channel: &str, sink: MessageSink) -> Result<ListenerHandle> {
        let client = self.client.clone();
        let mut conn = listener_connection(&client).await?;
        let key = queue_key(channel, &self.id);
        let id = self.id.clone();
        let chan = channel.to_string();
        let poll_timeout = self.config.poll_timeout_secs;
        let retry_interval = self.config.retry_interval;

        let task = tokio::spawn(async move {
            loop {
                if sink.is_closed() {
                    break;
                }
                let popped: Option<(String, String)> = match conn.blpop(&key, poll_timeout).await {
                    Ok(popped) => popped,
                    Err(e) => {
                        warn!("{}: BLPOP on {} failed: {}", id, key, e);
                        tokio::time::sleep(retry_interval).await;
                        match listener_connection(&client).await {
                            Ok(fresh) => conn = fresh,
                            Err(e) => warn!("{}: {}", id, e),
                        }
                        continue;
                    }
                };
                let Some((_, payload)) = popped else {
                    continue;
                };

                let raw: FieldValues = match serde_json::from_str(&payload) {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!("{}: dropping undecodable payload on {}: {}", id, chan, e);
                        continue;
                    }
                };
                if deliver(&id, &chan, &raw, &sink).await == Delivery::SinkClosed {
                    break;
                }
            }
            debug!("{}: listener on {} stopped", id, chan);
        });
        Ok(ListenerHandle::new(channel, task))
    }
}
