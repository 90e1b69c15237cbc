//! Daemon settings.
//!
//! Loaded once at startup from a TOML file; every field has a default so a
//! missing file or section yields a working configuration.

use crate::defaults::{DefaultFlow, RFVS_PREFIX};
use crate::error::{Result, ServerError};
use rf_protocol::defaults::{
    RFCLIENT_RFSERVER_CHANNEL, RFSERVER_ID, RFSERVER_RFPROXY_CHANNEL,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default settings file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/routeflow/rfserver.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub files: FilesSection,
    #[serde(default)]
    pub transport: TransportSection,
    #[serde(default)]
    pub datapath: DatapathSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Service id the server listens as.
    #[serde(default = "default_id")]
    pub id: String,

    #[serde(default = "default_client_channel")]
    pub client_channel: String,

    #[serde(default = "default_proxy_channel")]
    pub proxy_channel: String,

    /// Capacity of the dispatcher queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Budget for a single store or transport call.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,

    #[serde(default = "default_clear_tables_on_start")]
    pub clear_tables_on_start: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesSection {
    /// VM port to datapath port mapping.
    #[serde(default = "default_config_csv")]
    pub config_csv: PathBuf,

    /// Inter-switch links. A missing file means no links.
    #[serde(default = "default_isl_csv")]
    pub isl_csv: Option<PathBuf>,
}

/// Storage and transport backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process tables and bus. Only useful for dry runs.
    Memory,
    #[default]
    Redis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSection {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    #[serde(default)]
    pub redis_db: u32,

    /// Blocking read timeout of a listener poll.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatapathSection {
    /// Flows installed once on every regular datapath, in order.
    #[serde(default = "default_flows")]
    pub default_flows: Vec<DefaultFlow>,

    /// Upper 32 bits of the overlay switch datapath id.
    #[serde(default = "default_rfvs_prefix")]
    pub rfvs_prefix: u32,
}

fn default_id() -> String {
    RFSERVER_ID.to_string()
}

fn default_client_channel() -> String {
    RFCLIENT_RFSERVER_CHANNEL.to_string()
}

fn default_proxy_channel() -> String {
    RFSERVER_RFPROXY_CHANNEL.to_string()
}

fn default_queue_depth() -> usize {
    1024
}

fn default_op_timeout_ms() -> u64 {
    2000
}

fn default_clear_tables_on_start() -> bool {
    true
}

fn default_config_csv() -> PathBuf {
    PathBuf::from("/etc/routeflow/rfconfig.csv")
}

fn default_isl_csv() -> Option<PathBuf> {
    Some(PathBuf::from("/etc/routeflow/islconf.csv"))
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_poll_timeout_secs() -> f64 {
    1.0
}

fn default_flows() -> Vec<DefaultFlow> {
    DefaultFlow::STANDARD.to_vec()
}

fn default_rfvs_prefix() -> u32 {
    RFVS_PREFIX
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            id: default_id(),
            client_channel: default_client_channel(),
            proxy_channel: default_proxy_channel(),
            queue_depth: default_queue_depth(),
            op_timeout_ms: default_op_timeout_ms(),
            clear_tables_on_start: default_clear_tables_on_start(),
        }
    }
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            config_csv: default_config_csv(),
            isl_csv: default_isl_csv(),
        }
    }
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            redis_db: 0,
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl Default for DatapathSection {
    fn default() -> Self {
        Self {
            default_flows: default_flows(),
            rfvs_prefix: default_rfvs_prefix(),
        }
    }
}

impl RfServerConfig {
    /// Parses settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ServerError::config(format!("failed to parse settings: {}", e)))
    }

    /// Loads settings from file, falling back to defaults if it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| match e {
                ServerError::Config(msg) => {
                    ServerError::config(format!("{}: {}", path.display(), msg))
                }
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "settings file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ServerError::Io(e)),
        }
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        for (name, value) in [
            ("server.id", &server.id),
            ("server.client_channel", &server.client_channel),
            ("server.proxy_channel", &server.proxy_channel),
        ] {
            if value.trim().is_empty() {
                return Err(ServerError::config(format!("{} must not be empty", name)));
            }
        }
        if server.client_channel == server.proxy_channel {
            return Err(ServerError::config(format!(
                "client and proxy channels are both '{}'",
                server.client_channel
            )));
        }
        if server.queue_depth == 0 {
            return Err(ServerError::config("server.queue_depth must be positive"));
        }
        if server.op_timeout_ms == 0 {
            return Err(ServerError::config("server.op_timeout_ms must be positive"));
        }
        if !(self.transport.poll_timeout_secs > 0.0) {
            return Err(ServerError::config(
                "transport.poll_timeout_secs must be positive",
            ));
        }
        if self.datapath.default_flows.first() != Some(&DefaultFlow::ClearFlowTable) {
            return Err(ServerError::config(
                "datapath.default_flows must start with clear_flow_table",
            ));
        }
        Ok(())
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.server.op_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RfServerConfig::default();
        assert_eq!(config.server.id, "rfserver");
        assert_eq!(config.server.client_channel, "rfclient<->rfserver");
        assert_eq!(config.server.proxy_channel, "rfserver<->rfproxy");
        assert_eq!(config.server.queue_depth, 1024);
        assert_eq!(config.op_timeout(), Duration::from_secs(2));
        assert!(config.server.clear_tables_on_start);
        assert_eq!(config.transport.backend, Backend::Redis);
        assert_eq!(config.datapath.rfvs_prefix, 0x7266_7673);
        assert_eq!(config.datapath.default_flows, DefaultFlow::STANDARD.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = RfServerConfig::from_toml(
            r#"
            [server]
            queue_depth = 16

            [transport]
            backend = "memory"

            [datapath]
            default_flows = ["clear_flow_table", "arp", "vm_info"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.queue_depth, 16);
        assert_eq!(config.server.id, "rfserver");
        assert_eq!(config.transport.backend, Backend::Memory);
        assert_eq!(config.transport.redis_port, 6379);
        assert_eq!(
            config.datapath.default_flows,
            vec![DefaultFlow::ClearFlowTable, DefaultFlow::Arp, DefaultFlow::VmInfo]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_default_flow_rejected() {
        let err = RfServerConfig::from_toml("[datapath]\ndefault_flows = [\"telnet\"]\n");
        assert!(matches!(err, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = RfServerConfig::default();
        config.server.queue_depth = 0;
        assert!(config.validate().is_err());

        let mut config = RfServerConfig::default();
        config.server.op_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RfServerConfig::default();
        config.server.proxy_channel = config.server.client_channel.clone();
        assert!(config.validate().is_err());

        let mut config = RfServerConfig::default();
        config.server.id = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = RfServerConfig::default();
        config.datapath.default_flows = vec![DefaultFlow::DropAll, DefaultFlow::ClearFlowTable];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[files]\nconfig_csv = \"/tmp/rfconfig.csv\"\n\n[server]\nclear_tables_on_start = false"
        )
        .unwrap();

        let config = RfServerConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.files.config_csv, PathBuf::from("/tmp/rfconfig.csv"));
        assert!(!config.server.clear_tables_on_start);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RfServerConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, RfServerConfig::default());
    }

    #[test]
    fn test_malformed_file_names_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nid = 1").unwrap();

        let err = RfServerConfig::load_or_default(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
