use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Observable snapshot of one replica's health.
#[derive(Clone, Debug)]
pub struct ReplicaStatus {
    pub addr: SocketAddr,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct ReplicaState {
    addr: SocketAddr,
    healthy: bool,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
}

impl ReplicaState {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            healthy: true,
            consecutive_failures: 0,
            last_success: None,
            last_failure: None,
        }
    }
}

/// The set of replicas known to the master, with per-replica health.
///
/// Health transitions are one-directional during normal operation: a
/// replica that reaches `max_failures` consecutive failures is skipped
/// until [`reset_health`](Self::reset_health) or a process restart. A
/// success resets the failure counter and re-marks the replica healthy.
pub struct ReplicaSet {
    max_failures: u32,
    replicas: Mutex<Vec<ReplicaState>>,
}

impl ReplicaSet {
    pub fn new(addrs: impl IntoIterator<Item = SocketAddr>, max_failures: u32) -> Self {
        Self {
            max_failures,
            replicas: Mutex::new(addrs.into_iter().map(ReplicaState::new).collect()),
        }
    }

    /// Addresses of replicas currently marked healthy.
    pub fn healthy_addrs(&self) -> Vec<SocketAddr> {
        self.replicas
            .lock()
            .iter()
            .filter(|r| r.healthy)
            .map(|r| r.addr)
            .collect()
    }

    /// Record a successful acknowledgement from `addr`.
    pub fn mark_success(&self, addr: SocketAddr) {
        let mut replicas = self.replicas.lock();
        if let Some(r) = replicas.iter_mut().find(|r| r.addr == addr) {
            if !r.healthy {
                info!(replica = %addr, "replica acknowledged again, marking healthy");
            }
            r.healthy = true;
            r.consecutive_failures = 0;
            r.last_success = Some(Utc::now());
        }
    }

    /// Record a failed attempt against `addr`; flips the replica to
    /// unhealthy once the consecutive-failure threshold is reached.
    pub fn mark_failure(&self, addr: SocketAddr) {
        let mut replicas = self.replicas.lock();
        if let Some(r) = replicas.iter_mut().find(|r| r.addr == addr) {
            r.consecutive_failures += 1;
            r.last_failure = Some(Utc::now());
            if r.healthy && r.consecutive_failures >= self.max_failures {
                r.healthy = false;
                warn!(
                    replica = %addr,
                    failures = r.consecutive_failures,
                    "replica marked unhealthy, skipping until reset"
                );
            }
        }
    }

    /// Operator-driven reset: clear failure counts and mark every replica
    /// healthy again.
    pub fn reset_health(&self) {
        let mut replicas = self.replicas.lock();
        for r in replicas.iter_mut() {
            if !r.healthy {
                info!(replica = %r.addr, "health reset by operator");
            }
            r.healthy = true;
            r.consecutive_failures = 0;
        }
    }

    /// Snapshot of every replica's state.
    pub fn status(&self) -> Vec<ReplicaStatus> {
        self.replicas
            .lock()
            .iter()
            .map(|r| ReplicaStatus {
                addr: r.addr,
                healthy: r.healthy,
                consecutive_failures: r.consecutive_failures,
                last_success: r.last_success,
                last_failure: r.last_failure,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.replicas.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.lock().is_empty()
    }
}
