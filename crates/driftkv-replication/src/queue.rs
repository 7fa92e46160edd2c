use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use driftkv_types::Mutation;

use crate::error::{ReplicationError, ReplicationResult};

struct QueueInner {
    ops: VecDeque<Mutation>,
    shutdown: bool,
}

/// Bounded FIFO of pending replication operations.
///
/// Producers never block: when the queue is full the op is dropped and
/// counted, because the master's local state is already committed and the
/// client must not be held up by replication backlog. Consumers block on a
/// condvar until an op arrives or the queue shuts down.
pub struct OpQueue {
    inner: Mutex<QueueInner>,
    ready: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl OpQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                ops: VecDeque::new(),
                shutdown: false,
            }),
            ready: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Non-blocking enqueue. On overflow the op is dropped and counted.
    pub fn try_push(&self, op: Mutation) -> ReplicationResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.shutdown {
                return Err(ReplicationError::QueueFull);
            }
            if inner.ops.len() >= self.capacity {
                drop(inner);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(capacity = self.capacity, "replication queue full, op dropped");
                return Err(ReplicationError::QueueFull);
            }
            inner.ops.push_back(op);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Block until an op is available; returns `None` once the queue has
    /// shut down. Pending ops are discarded at shutdown so workers exit in
    /// bounded time.
    pub fn pop(&self) -> Option<Mutation> {
        let mut inner = self.inner.lock();
        loop {
            if inner.shutdown {
                return None;
            }
            if let Some(op) = inner.ops.pop_front() {
                return Some(op);
            }
            self.ready.wait(&mut inner);
        }
    }

    /// Wake all blocked consumers and make further pops return `None`.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutdown = true;
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ops dropped due to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
