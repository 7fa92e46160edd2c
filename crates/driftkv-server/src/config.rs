use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use driftkv_engine::{CompactionConfig, StoreConfig};
use driftkv_replication::{ReplicationConfig, ReplicationMode};
use driftkv_types::NodeRole;

use crate::error::{ServerError, ServerResult};

/// Complete configuration of one driftkv node, loadable from TOML.
///
/// Every field has a default, so a config file only names what it
/// changes. Durations are plain seconds in the file; conversion to the
/// engine's types happens here and nowhere else.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    pub role: NodeRole,
    pub data_dir: PathBuf,
    pub checkpoint_interval_secs: u64,
    pub max_wal_size: u64,
    pub compaction: CompactionSection,
    pub replication: ReplicationSection,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4141".parse().unwrap(),
            role: NodeRole::Master,
            data_dir: PathBuf::from("data"),
            checkpoint_interval_secs: 10,
            max_wal_size: 64 * 1024 * 1024,
            compaction: CompactionSection::default(),
            replication: ReplicationSection::default(),
        }
    }
}

/// `[compaction]` section.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionSection {
    pub enabled: bool,
    pub interval_secs: u64,
    pub dead_ratio: f64,
    pub min_file_size: u64,
}

impl Default for CompactionSection {
    fn default() -> Self {
        let defaults = CompactionConfig::default();
        Self {
            enabled: defaults.enabled,
            interval_secs: defaults.interval.as_secs(),
            dead_ratio: defaults.dead_ratio,
            min_file_size: defaults.min_file_size,
        }
    }
}

/// `[replication]` section. Only meaningful on the master.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationSection {
    pub enabled: bool,
    pub mode: ReplicationMode,
    pub replicas: Vec<SocketAddr>,
    pub max_retries: u32,
    pub queue_size: usize,
    pub max_failures: u32,
    pub timeout_secs: u64,
}

impl Default for ReplicationSection {
    fn default() -> Self {
        let defaults = ReplicationConfig::default();
        Self {
            enabled: false,
            mode: defaults.mode,
            replicas: Vec::new(),
            max_retries: defaults.max_retries,
            queue_size: defaults.queue_size,
            max_failures: defaults.max_failures,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

impl NodeConfig {
    /// Read a TOML config file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// The engine's view of this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            data_dir: self.data_dir.clone(),
            checkpoint_interval: Duration::from_secs(self.checkpoint_interval_secs),
            max_wal_size: self.max_wal_size,
            compaction: CompactionConfig {
                enabled: self.compaction.enabled,
                interval: Duration::from_secs(self.compaction.interval_secs),
                dead_ratio: self.compaction.dead_ratio,
                min_file_size: self.compaction.min_file_size,
            },
        }
    }

    /// The replicator's view, or `None` when this node replicates nothing
    /// (replica role, replication disabled, or no replicas listed).
    pub fn replication_config(&self) -> Option<ReplicationConfig> {
        if self.role.is_replica() || !self.replication.enabled || self.replication.replicas.is_empty()
        {
            return None;
        }
        Some(ReplicationConfig {
            mode: self.replication.mode,
            replicas: self.replication.replicas.clone(),
            max_retries: self.replication.max_retries,
            queue_size: self.replication.queue_size,
            max_failures: self.replication.max_failures,
            timeout: Duration::from_secs(self.replication.timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:4141".parse().unwrap());
        assert_eq!(config.role, NodeRole::Master);
        assert_eq!(config.checkpoint_interval_secs, 10);
        assert!(config.replication_config().is_none());
    }

    #[test]
    fn parse_minimal_toml() {
        let config: NodeConfig = toml::from_str(
            r#"
            bind_addr = "0.0.0.0:4141"
            role = "replica"
            data_dir = "/var/lib/driftkv"
            "#,
        )
        .unwrap();
        assert_eq!(config.role, NodeRole::Replica);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/driftkv"));
        // Unnamed sections keep their defaults.
        assert!(config.compaction.enabled);
        assert_eq!(config.replication.queue_size, 10_000);
    }

    #[test]
    fn parse_replication_section() {
        let config: NodeConfig = toml::from_str(
            r#"
            [replication]
            enabled = true
            mode = "sync"
            replicas = ["10.0.0.2:4141", "10.0.0.3:4141"]
            timeout_secs = 2
            "#,
        )
        .unwrap();
        let replication = config.replication_config().unwrap();
        assert_eq!(replication.mode, ReplicationMode::Sync);
        assert_eq!(replication.replicas.len(), 2);
        assert_eq!(replication.timeout, Duration::from_secs(2));
    }

    #[test]
    fn replica_never_gets_a_replicator() {
        let config: NodeConfig = toml::from_str(
            r#"
            role = "replica"

            [replication]
            enabled = true
            replicas = ["10.0.0.2:4141"]
            "#,
        )
        .unwrap();
        assert!(config.replication_config().is_none());
    }

    #[test]
    fn store_config_conversion() {
        let mut config = NodeConfig::default();
        config.checkpoint_interval_secs = 30;
        config.compaction.interval_secs = 120;
        let store = config.store_config();
        assert_eq!(store.checkpoint_interval, Duration::from_secs(30));
        assert_eq!(store.compaction.interval, Duration::from_secs(120));
    }
}
