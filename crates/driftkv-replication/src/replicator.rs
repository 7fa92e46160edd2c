use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use driftkv_types::Mutation;

use crate::client;
use crate::error::{ReplicationError, ReplicationResult};
use crate::queue::OpQueue;
use crate::replica::{ReplicaSet, ReplicaStatus};

/// Worker threads draining the op queue in async mode.
const NUM_WORKERS: usize = 2;

/// When to acknowledge a mutation relative to replication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationMode {
    /// Commit locally, enqueue, return. Replication happens in the
    /// background; overflow drops ops.
    Async,
    /// Commit locally, then block until every healthy replica acks.
    Sync,
}

impl std::fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Async => write!(f, "async"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

/// Configuration for the master's replication pipeline.
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    pub mode: ReplicationMode,
    pub replicas: Vec<SocketAddr>,
    /// Attempts per op per replica before it counts as one failure.
    pub max_retries: u32,
    /// Async op queue capacity; overflow drops ops.
    pub queue_size: usize,
    /// Consecutive failures before a replica is marked unhealthy.
    pub max_failures: u32,
    /// Per-attempt connect/read/write timeout.
    pub timeout: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            mode: ReplicationMode::Async,
            replicas: Vec::new(),
            max_retries: 3,
            queue_size: 10_000,
            max_failures: 3,
            timeout: Duration::from_secs(5),
        }
    }
}

/// The master's replication pipeline: replica set, op queue, worker pool.
///
/// In async mode two worker threads drain the queue and forward each op to
/// every healthy replica. In sync mode there are no workers; the mutating
/// thread calls [`replicate_blocking`](Self::replicate_blocking) itself.
pub struct Replicator {
    config: ReplicationConfig,
    replicas: ReplicaSet,
    queue: Arc<OpQueue>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Replicator {
    /// Build the pipeline and, in async mode, start its worker pool.
    pub fn start(config: ReplicationConfig) -> Arc<Self> {
        let replicas = ReplicaSet::new(config.replicas.iter().copied(), config.max_failures);
        let queue = Arc::new(OpQueue::new(config.queue_size));
        let replicator = Arc::new(Self {
            replicas,
            queue,
            workers: Mutex::new(Vec::new()),
            config,
        });

        if replicator.config.mode == ReplicationMode::Async {
            let mut workers = replicator.workers.lock();
            for i in 0..NUM_WORKERS {
                let r = Arc::clone(&replicator);
                let handle = std::thread::Builder::new()
                    .name(format!("driftkv-repl-{i}"))
                    .spawn(move || r.worker_loop())
                    .expect("failed to spawn replication worker");
                workers.push(handle);
            }
        }

        info!(
            mode = %replicator.config.mode,
            replicas = replicator.replicas.len(),
            "replicator started"
        );
        replicator
    }

    pub fn mode(&self) -> ReplicationMode {
        self.config.mode
    }

    /// Async path: non-blocking enqueue. A full queue drops the op; the
    /// caller's local commit already succeeded, so nothing is surfaced.
    pub fn enqueue(&self, op: Mutation) {
        if self.queue.try_push(op).is_err() {
            warn!(
                dropped_total = self.queue.dropped(),
                "replication op dropped (queue full)"
            );
        }
    }

    /// Sync path: forward `op` to every healthy replica from the calling
    /// thread. Succeeds only if all of them acknowledge.
    pub fn replicate_blocking(&self, op: &Mutation) -> ReplicationResult<()> {
        let addrs = self.replicas.healthy_addrs();
        let total = addrs.len();
        let mut failed = 0;
        for addr in addrs {
            if !self.forward_with_retries(addr, op) {
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(ReplicationError::Incomplete { failed, total });
        }
        Ok(())
    }

    /// Ops dropped by the async queue since startup.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Pending ops in the async queue.
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    /// Per-replica health snapshot.
    pub fn status(&self) -> Vec<ReplicaStatus> {
        self.replicas.status()
    }

    /// Operator-driven reset of all replica health state.
    pub fn reset_health(&self) {
        self.replicas.reset_health();
    }

    /// Stop workers and discard any backlog. Idempotent.
    pub fn shutdown(&self) {
        self.queue.shutdown();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn worker_loop(&self) {
        while let Some(op) = self.queue.pop() {
            for addr in self.replicas.healthy_addrs() {
                self.forward_with_retries(addr, &op);
            }
        }
        debug!("replication worker exiting");
    }

    /// One op against one replica, with per-attempt retries. Returns
    /// whether the replica acknowledged; health is updated either way.
    fn forward_with_retries(&self, addr: SocketAddr, op: &Mutation) -> bool {
        let attempts = self.config.max_retries.max(1);
        for attempt in 1..=attempts {
            match client::forward(addr, op, self.config.timeout) {
                Ok(()) => {
                    self.replicas.mark_success(addr);
                    return true;
                }
                Err(e) => {
                    debug!(
                        replica = %addr,
                        attempt,
                        error = %e,
                        op = op.kind(),
                        "replication attempt failed"
                    );
                }
            }
        }
        self.replicas.mark_failure(addr);
        false
    }
}

impl Drop for Replicator {
    fn drop(&mut self) {
        self.queue.shutdown();
    }
}
