use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use driftkv_replication::{ReplicationMode, Replicator};
use driftkv_types::{DisplayBytes, Mutation, NodeRole};

use crate::compactor;
use crate::config::StoreConfig;
use crate::data_file::DataFile;
use crate::error::{EngineError, EngineResult};
use crate::index::Index;
use crate::recovery;
use crate::wal::{Wal, WalOp};
use crate::worker::PeriodicWorker;

/// Everything guarded by the data read-write lock.
pub(crate) struct DataState {
    pub(crate) file: DataFile,
    pub(crate) index: Index,
}

/// Point-in-time view of the store's size and space accounting.
#[derive(Clone, Copy, Debug)]
pub struct StoreStats {
    pub keys: usize,
    pub file_size: u64,
    pub live_bytes: u64,
    pub dead_ratio: f64,
    pub wal_size: u64,
}

/// The storage orchestrator.
///
/// Two independent locks order all access: the WAL mutex serializes log
/// appends, and the data lock (readers concurrent, writer exclusive,
/// writer-preferring) guards the data file and index together. A mutation
/// passes through three phases in order: WAL append, data/index update,
/// replication hand-off. Reads touch only the data lock.
///
/// Because the two locks are taken in separate phases, two concurrent puts
/// may land in the WAL and the data file in opposite orders. Recovery
/// replays the WAL, so WAL order is the order that survives a crash.
pub struct Store {
    pub(crate) config: StoreConfig,
    role: NodeRole,
    pub(crate) wal: Mutex<Wal>,
    pub(crate) data: RwLock<DataState>,
    replicator: Option<Arc<Replicator>>,
    running: AtomicBool,
    wal_size_warned: AtomicBool,
    workers: Mutex<Vec<PeriodicWorker>>,
}

impl Store {
    /// Open the store: run recovery, then start background workers.
    ///
    /// The returned store is ready to serve. A replicator is accepted only
    /// on the master; replicas apply incoming mutations through the same
    /// paths but never propagate further and never compact.
    pub fn open(
        config: StoreConfig,
        role: NodeRole,
        replicator: Option<Arc<Replicator>>,
    ) -> EngineResult<Arc<Self>> {
        fs::create_dir_all(&config.data_dir)?;

        let mut index = Index::load(&config.index_path());
        let mut file = DataFile::open(&config.data_path())?;
        let mut wal = Wal::open(&config.wal_path())?;

        let replayed = recovery::replay_wal(&wal, &mut file, &mut index)?;
        index.save(&config.index_path())?;
        wal.truncate()?;

        info!(
            data_dir = %config.data_dir.display(),
            %role,
            keys = index.len(),
            replayed,
            "store recovered"
        );

        let replicator = match (role, replicator) {
            (NodeRole::Replica, Some(_)) => {
                warn!("replicator ignored on a replica node");
                None
            }
            (_, r) => r,
        };

        let store = Arc::new(Self {
            config,
            role,
            wal: Mutex::new(wal),
            data: RwLock::new(DataState { file, index }),
            replicator,
            running: AtomicBool::new(true),
            wal_size_warned: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        });
        store.spawn_workers();
        Ok(store)
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Write one key/value pair. Returns once the mutation is durable in
    /// the WAL and visible in the index (async replication), or once every
    /// healthy replica has acknowledged it (sync replication).
    pub fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.ensure_running()?;
        {
            let mut wal = self.wal.lock();
            wal.append(&WalOp::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            })?;
            self.check_wal_size(&wal);
        }
        {
            let mut data = self.data.write();
            let slot = data.file.append(key, value)?;
            data.index.put(key.to_vec(), slot);
        }
        self.propagate(Mutation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Write N pairs as one batch: one WAL-mutex hold, one write-lock
    /// hold. The batch succeeds in full or surfaces an error; partial
    /// application is never reported as success.
    pub fn batch_put(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> EngineResult<()> {
        self.ensure_running()?;
        if keys.len() != values.len() {
            return Err(EngineError::BatchMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        if keys.is_empty() {
            return Ok(());
        }

        let ops: Vec<WalOp> = keys
            .iter()
            .zip(values)
            .map(|(k, v)| WalOp::Put {
                key: k.clone(),
                value: v.clone(),
            })
            .collect();
        {
            let mut wal = self.wal.lock();
            wal.append_batch(ops.iter())?;
            self.check_wal_size(&wal);
        }
        {
            let mut data = self.data.write();
            for (key, value) in keys.iter().zip(values) {
                let slot = data.file.append(key, value)?;
                data.index.put(key.clone(), slot);
            }
        }
        self.propagate(Mutation::BatchPut {
            keys: keys.to_vec(),
            values: values.to_vec(),
        })
    }

    /// Read the current value of `key`, or `None` if absent.
    ///
    /// The record's stored key is compared against the requested key; a
    /// mismatch means the index is pointing at foreign bytes. The stale
    /// entry is evicted so subsequent reads miss cleanly, and the
    /// corruption is surfaced to this caller.
    pub fn read(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let slot = {
            let data = self.data.read();
            let Some(slot) = data.index.get(key) else {
                return Ok(None);
            };
            let (stored_key, value) = data.file.read_at(slot.offset)?;
            if stored_key == key {
                return Ok(Some(value));
            }
            slot
        };

        error!(
            key = %DisplayBytes(key),
            offset = slot.offset,
            "stored key does not match index, evicting entry"
        );
        let mut data = self.data.write();
        if data.index.get(key) == Some(slot) {
            data.index.remove(key);
        }
        Err(EngineError::Corruption {
            offset: slot.offset,
            reason: "stored key does not match index".to_string(),
        })
    }

    /// All live pairs whose key falls in `[start, end]`, both ends
    /// inclusive under byte comparison. Order is unspecified.
    pub fn read_range(&self, start: &[u8], end: &[u8]) -> EngineResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read();
        let hits = data.index.range(start, end);
        let mut pairs = Vec::with_capacity(hits.len());
        for (key, slot) in hits {
            let (stored_key, value) = data.file.read_at(slot.offset)?;
            if stored_key != key {
                error!(
                    key = %DisplayBytes(&key),
                    offset = slot.offset,
                    "stored key does not match index in range read"
                );
                return Err(EngineError::Corruption {
                    offset: slot.offset,
                    reason: "stored key does not match index".to_string(),
                });
            }
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    /// Delete `key`. Returns `false` if the key was absent.
    ///
    /// Three phases: probe under the read lock (cheap early exit), log
    /// under the WAL mutex, remove under the write lock. The removal
    /// re-checks presence: another deleter may have won between the probe
    /// and the write lock, and only one caller gets `true`.
    pub fn delete(&self, key: &[u8]) -> EngineResult<bool> {
        self.ensure_running()?;
        {
            let data = self.data.read();
            if data.index.get(key).is_none() {
                return Ok(false);
            }
        }
        {
            let mut wal = self.wal.lock();
            wal.append(&WalOp::Delete { key: key.to_vec() })?;
        }
        {
            let mut data = self.data.write();
            if data.index.remove(key).is_none() {
                return Ok(false);
            }
        }
        self.propagate(Mutation::Delete { key: key.to_vec() })?;
        Ok(true)
    }

    /// Apply a mutation received over the replication channel.
    pub fn apply(&self, op: Mutation) -> EngineResult<()> {
        match op {
            Mutation::Put { key, value } => self.put(&key, &value),
            Mutation::BatchPut { keys, values } => self.batch_put(&keys, &values),
            Mutation::Delete { key } => self.delete(&key).map(|_| ()),
        }
    }

    /// Snapshot the index to disk now. The checkpoint worker calls this on
    /// its interval; it never touches the WAL.
    pub fn checkpoint_now(&self) -> EngineResult<()> {
        let data = self.data.read();
        data.index.save(&self.config.index_path())
    }

    /// Run a compaction pass now if the trigger thresholds are met.
    /// Returns whether a pass ran.
    pub fn compact_now(&self) -> EngineResult<bool> {
        compactor::run_if_needed(self)
    }

    /// Size and space accounting for logs, compaction triggers, and tests.
    pub fn stats(&self) -> StoreStats {
        let (keys, file_size, live_bytes) = {
            let data = self.data.read();
            (data.index.len(), data.file.size(), data.index.live_bytes())
        };
        let dead_ratio = if file_size == 0 {
            0.0
        } else {
            1.0 - live_bytes as f64 / file_size as f64
        };
        StoreStats {
            keys,
            file_size,
            live_bytes,
            dead_ratio,
            wal_size: self.wal.lock().len(),
        }
    }

    /// Graceful shutdown: stop workers, stop the replicator, snapshot the
    /// index, flush the data file. Idempotent.
    pub fn close(&self) -> EngineResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        {
            let mut workers = self.workers.lock();
            for worker in workers.iter_mut() {
                worker.stop();
            }
            workers.clear();
        }
        if let Some(replicator) = &self.replicator {
            replicator.shutdown();
        }
        let data = self.data.read();
        data.index.save(&self.config.index_path())?;
        data.file.sync()?;
        info!("store closed");
        Ok(())
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(EngineError::Closed)
        }
    }

    /// Hand a committed mutation to the replication pipeline.
    fn propagate(&self, op: Mutation) -> EngineResult<()> {
        let Some(replicator) = &self.replicator else {
            return Ok(());
        };
        match replicator.mode() {
            ReplicationMode::Async => {
                replicator.enqueue(op);
                Ok(())
            }
            ReplicationMode::Sync => {
                replicator.replicate_blocking(&op)?;
                Ok(())
            }
        }
    }

    fn check_wal_size(&self, wal: &Wal) {
        if wal.len() > self.config.max_wal_size && !self.wal_size_warned.swap(true, Ordering::Relaxed)
        {
            warn!(
                wal_size = wal.len(),
                advisory_max = self.config.max_wal_size,
                "wal exceeds advisory size; it empties on next restart"
            );
        }
    }

    fn spawn_workers(self: &Arc<Self>) {
        let mut workers = self.workers.lock();

        let weak = Arc::downgrade(self);
        workers.push(PeriodicWorker::spawn(
            "driftkv-checkpoint",
            self.config.checkpoint_interval,
            move || match weak.upgrade() {
                Some(store) if store.is_running() => {
                    if let Err(e) = store.checkpoint_now() {
                        error!(error = %e, "checkpoint failed");
                    } else {
                        let stats = store.stats();
                        debug!(
                            keys = stats.keys,
                            file_size = stats.file_size,
                            dead_ratio = stats.dead_ratio,
                            "checkpoint complete"
                        );
                    }
                    true
                }
                _ => false,
            },
        ));

        if self.role.is_master() && self.config.compaction.enabled {
            let weak = Arc::downgrade(self);
            workers.push(PeriodicWorker::spawn(
                "driftkv-compactor",
                self.config.compaction.interval,
                move || match weak.upgrade() {
                    Some(store) if store.is_running() => {
                        match compactor::run_if_needed(&store) {
                            Ok(true) => info!("compaction pass complete"),
                            Ok(false) => debug!("compaction skipped"),
                            Err(e) => error!(error = %e, "compaction failed"),
                        }
                        true
                    }
                    _ => false,
                },
            ));
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.close() {
                error!(error = %e, "error closing store on drop");
            }
        }
    }
}
