use std::path::PathBuf;
use std::time::Duration;

/// Write-ahead log file name inside the data directory.
pub const WAL_FILE: &str = "wal.log";
/// Append-only data file name.
pub const DATA_FILE: &str = "data.db";
/// One-generation backup kept by compaction.
pub const BACKUP_FILE: &str = "data.db.old";
/// Index snapshot file name.
pub const INDEX_FILE: &str = "index.db";

/// Configuration for one [`Store`](crate::store::Store).
///
/// Immutable once constructed; every component receives it by value at
/// startup and never consults process-wide state.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding the WAL, data file, and index snapshot.
    pub data_dir: PathBuf,
    /// Interval between index snapshots taken by the checkpoint worker.
    pub checkpoint_interval: Duration,
    /// Advisory WAL size; exceeding it logs a warning, nothing more.
    pub max_wal_size: u64,
    pub compaction: CompactionConfig,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILE)
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.data_dir.join(BACKUP_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(INDEX_FILE)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            checkpoint_interval: Duration::from_secs(10),
            max_wal_size: 64 * 1024 * 1024,
            compaction: CompactionConfig::default(),
        }
    }
}

/// Compaction trigger thresholds and cadence. Compaction runs on the
/// master only; replicas never compact.
#[derive(Clone, Debug)]
pub struct CompactionConfig {
    pub enabled: bool,
    /// Interval between trigger checks.
    pub interval: Duration,
    /// Minimum fraction of the data file that must be dead space.
    pub dead_ratio: f64,
    /// Files smaller than this are never compacted.
    pub min_file_size: u64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3600),
            dead_ratio: 0.3,
            min_file_size: 10 * 1024 * 1024,
        }
    }
}
