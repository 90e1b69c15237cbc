//! Static configuration files.
//!
//! Two comma-separated files describe the deployment. Both start with a
//! header line; blank lines and `#` comments are skipped.
//!
//! - VM/DP config: `vm_id,vm_port,ct_id,dp_id,dp_port`
//! - ISL config: `vm_id,ct_id,dp_id,dp_port,eth_addr,rem_ct,rem_id,rem_port,rem_eth_addr`
//!
//! VM and datapath ids are hex, everything else decimal.

use crate::error::{Result, ServerError};
use rf_table::{ConfigEntry, IslConfigEntry, IslEndpoint};
use rf_types::{format_id, parse_id_hex, MacAddress};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

const CONFIG_COLUMNS: usize = 5;
const ISL_COLUMNS: usize = 9;

/// Static VM/DP and ISL configuration, indexed for lookup.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    entries: Vec<ConfigEntry>,
    isl_entries: Vec<IslConfigEntry>,
    by_vm_port: HashMap<(u64, u32), usize>,
    by_dp_port: HashMap<(u64, u64, u32), usize>,
}

impl StaticConfig {
    /// Builds the lookup indexes. On duplicate keys the first row wins.
    pub fn new(entries: Vec<ConfigEntry>, isl_entries: Vec<IslConfigEntry>) -> Self {
        let mut config = Self::default();

        for entry in entries {
            let vm_key = (entry.vm_id, entry.vm_port);
            let dp_key = (entry.ct_id, entry.dp_id, entry.dp_port);
            if config.by_vm_port.contains_key(&vm_key) || config.by_dp_port.contains_key(&dp_key) {
                warn!(%entry, "duplicate config row, keeping the first");
                continue;
            }
            let index = config.entries.len();
            config.by_vm_port.insert(vm_key, index);
            config.by_dp_port.insert(dp_key, index);
            config.entries.push(entry);
        }

        for link in isl_entries {
            let duplicate = config.isl_entries.iter().any(|known| {
                (known.local == link.local && known.remote == link.remote)
                    || (known.local == link.remote && known.remote == link.local)
            });
            if duplicate {
                warn!(local = %link.local, remote = %link.remote, "duplicate ISL row, keeping the first");
                continue;
            }
            config.isl_entries.push(link);
        }

        config
    }

    /// Loads both files. A missing ISL file means no links.
    pub fn load(config_csv: &Path, isl_csv: Option<&Path>) -> Result<Self> {
        let entries = parse_config_csv(&fs::read_to_string(config_csv)?, config_csv)?;

        let isl_entries = match isl_csv {
            Some(path) => match fs::read_to_string(path) {
                Ok(text) => parse_isl_csv(&text, path)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    info!(path = %path.display(), "ISL config not found, no links configured");
                    Vec::new()
                }
                Err(e) => return Err(ServerError::Io(e)),
            },
            None => Vec::new(),
        };

        let config = Self::new(entries, isl_entries);
        info!(
            ports = config.entries.len(),
            links = config.isl_entries.len(),
            "loaded static config"
        );
        Ok(config)
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn isl_entries(&self) -> &[IslConfigEntry] {
        &self.isl_entries
    }

    pub fn for_vm_port(&self, vm_id: u64, vm_port: u32) -> Option<&ConfigEntry> {
        self.by_vm_port
            .get(&(vm_id, vm_port))
            .map(|&index| &self.entries[index])
    }

    pub fn for_dp_port(&self, ct_id: u64, dp_id: u64, dp_port: u32) -> Option<&ConfigEntry> {
        self.by_dp_port
            .get(&(ct_id, dp_id, dp_port))
            .map(|&index| &self.entries[index])
    }

    /// Links with either end on the given port.
    pub fn isl_for_port(&self, ct_id: u64, dp_id: u64, dp_port: u32) -> Vec<&IslConfigEntry> {
        self.isl_entries
            .iter()
            .filter(|link| link.oriented_from(ct_id, dp_id, dp_port).is_some())
            .collect()
    }
}

/// A data line with its 1-based line number.
struct Row<'a> {
    path: &'a Path,
    line: usize,
    columns: Vec<&'a str>,
}

impl<'a> Row<'a> {
    fn error(&self, reason: impl Into<String>) -> ServerError {
        ServerError::static_config(PathBuf::from(self.path), self.line, reason)
    }

    fn hex_id(&self, index: usize, name: &str) -> Result<u64> {
        let raw = self.columns[index];
        parse_id_hex(raw).map_err(|_| self.error(format!("invalid {} '{}'", name, raw)))
    }

    fn num<T: FromStr>(&self, index: usize, name: &str) -> Result<T> {
        let raw = self.columns[index];
        raw.parse()
            .map_err(|_| self.error(format!("invalid {} '{}'", name, raw)))
    }

    fn mac(&self, index: usize, name: &str) -> Result<MacAddress> {
        self.num(index, name)
    }
}

/// Splits a file into data rows, skipping the header.
fn rows<'a>(text: &'a str, path: &'a Path, columns: usize) -> Result<Vec<Row<'a>>> {
    let mut rows = Vec::new();
    let mut header_seen = false;

    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if !header_seen {
            header_seen = true;
            continue;
        }

        let row = Row {
            path,
            line: index + 1,
            columns: trimmed.split(',').map(str::trim).collect(),
        };
        if row.columns.len() != columns {
            return Err(row.error(format!(
                "expected {} columns, found {}",
                columns,
                row.columns.len()
            )));
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Parses the VM/DP config file.
pub fn parse_config_csv(text: &str, path: &Path) -> Result<Vec<ConfigEntry>> {
    rows(text, path, CONFIG_COLUMNS)?
        .iter()
        .map(|row| {
            Ok(ConfigEntry::new(
                row.hex_id(0, "vm_id")?,
                row.num(1, "vm_port")?,
                row.num(2, "ct_id")?,
                row.hex_id(3, "dp_id")?,
                row.num(4, "dp_port")?,
            ))
        })
        .collect()
}

/// Parses the ISL config file.
pub fn parse_isl_csv(text: &str, path: &Path) -> Result<Vec<IslConfigEntry>> {
    rows(text, path, ISL_COLUMNS)?
        .iter()
        .map(|row| {
            let local = IslEndpoint::new(
                row.num(1, "ct_id")?,
                row.hex_id(2, "dp_id")?,
                row.num(3, "dp_port")?,
                row.mac(4, "eth_addr")?,
            );
            let remote = IslEndpoint::new(
                row.num(5, "rem_ct")?,
                row.hex_id(6, "rem_id")?,
                row.num(7, "rem_port")?,
                row.mac(8, "rem_eth_addr")?,
            );
            if local.ct_id == remote.ct_id && local.dp_id == remote.dp_id {
                return Err(row.error(format!(
                    "link loops back to datapath {}",
                    format_id(local.dp_id)
                )));
            }
            Ok(IslConfigEntry::new(row.hex_id(0, "vm_id")?, local, remote))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = "\
vm_id,vm_port,ct_id,dp_id,dp_port
12A0A0A0A0A0,1,0,99,1
12A0A0A0A0A0,2,0,99,2

# second switch
12A0A0A0A0A0,3,0,9A,1
";

    const ISL: &str = "\
vm_id,ct_id,dp_id,dp_port,eth_addr,rem_ct,rem_id,rem_port,rem_eth_addr
12A0A0A0A0A0,0,99,5,02:00:00:00:00:05,0,9A,7,02:00:00:00:00:07
";

    fn path() -> &'static Path {
        Path::new("rfconfig.csv")
    }

    #[test]
    fn test_parse_config_csv() {
        let entries = parse_config_csv(CONFIG, path()).unwrap();
        assert_eq!(
            entries,
            vec![
                ConfigEntry::new(0x12a0_a0a0_a0a0, 1, 0, 0x99, 1),
                ConfigEntry::new(0x12a0_a0a0_a0a0, 2, 0, 0x99, 2),
                ConfigEntry::new(0x12a0_a0a0_a0a0, 3, 0, 0x9a, 1),
            ]
        );
    }

    #[test]
    fn test_parse_isl_csv() {
        let entries = parse_isl_csv(ISL, path()).unwrap();
        assert_eq!(entries.len(), 1);
        let link = &entries[0];
        assert_eq!(link.vm_id, 0x12a0_a0a0_a0a0);
        assert_eq!(link.local.dp_id, 0x99);
        assert_eq!(link.local.dp_port, 5);
        assert_eq!(link.remote.dp_id, 0x9a);
        assert_eq!(link.remote.eth_addr.to_string(), "02:00:00:00:00:07");
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let text = "vm_id,vm_port,ct_id,dp_id,dp_port\n1,0,0,10,1\nzz,0,0,10,2\n";
        let err = parse_config_csv(text, path()).unwrap_err();
        assert_eq!(err.to_string(), "rfconfig.csv:3: invalid vm_id 'zz'");

        let text = "header\n1,0,0,10\n";
        let err = parse_config_csv(text, path()).unwrap_err();
        assert_eq!(err.to_string(), "rfconfig.csv:2: expected 5 columns, found 4");

        let text = "header\n1,0,0,10,-1\n";
        assert!(parse_config_csv(text, path()).is_err());
    }

    #[test]
    fn test_isl_loopback_rejected() {
        let text = "header\n1,0,99,5,02:00:00:00:00:05,0,99,6,02:00:00:00:00:06\n";
        assert!(parse_isl_csv(text, path()).is_err());
    }

    #[test]
    fn test_lookups() {
        let config = StaticConfig::new(
            parse_config_csv(CONFIG, path()).unwrap(),
            parse_isl_csv(ISL, path()).unwrap(),
        );

        let entry = config.for_vm_port(0x12a0_a0a0_a0a0, 2).unwrap();
        assert_eq!((entry.ct_id, entry.dp_id, entry.dp_port), (0, 0x99, 2));
        let entry = config.for_dp_port(0, 0x9a, 1).unwrap();
        assert_eq!(entry.vm_port, 3);
        assert!(config.for_vm_port(0x12a0_a0a0_a0a0, 9).is_none());
        assert!(config.for_dp_port(1, 0x99, 1).is_none());

        assert_eq!(config.isl_for_port(0, 0x99, 5).len(), 1);
        assert_eq!(config.isl_for_port(0, 0x9a, 7).len(), 1);
        assert!(config.isl_for_port(0, 0x99, 1).is_empty());
    }

    #[test]
    fn test_duplicates_keep_first_row() {
        let entries = vec![
            ConfigEntry::new(1, 0, 0, 0x10, 1),
            ConfigEntry::new(1, 0, 0, 0x10, 2),
            ConfigEntry::new(2, 0, 0, 0x10, 1),
        ];
        let config = StaticConfig::new(entries, Vec::new());
        assert_eq!(config.entries().len(), 1);
        assert_eq!(config.for_vm_port(1, 0).map(|e| e.dp_port), Some(1));

        let isl = parse_isl_csv(ISL, path()).unwrap();
        let reversed = IslConfigEntry::new(isl[0].vm_id, isl[0].remote, isl[0].local);
        let config = StaticConfig::new(Vec::new(), vec![isl[0].clone(), reversed]);
        assert_eq!(config.isl_entries().len(), 1);
    }

    #[test]
    fn test_load_from_files() {
        let mut config_file = NamedTempFile::new().unwrap();
        write!(config_file, "{}", CONFIG).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let config = StaticConfig::load(config_file.path(), Some(&dir.path().join("islconf.csv")))
            .unwrap();
        assert_eq!(config.entries().len(), 3);
        assert!(config.isl_entries().is_empty());

        assert!(StaticConfig::load(&dir.path().join("missing.csv"), None).is_err());
    }
}
