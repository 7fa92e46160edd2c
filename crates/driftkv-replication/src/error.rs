use std::net::SocketAddr;

/// Errors from the replication pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// The async op queue is at capacity; the op was dropped.
    #[error("replication queue is full")]
    QueueFull,

    /// A single replica did not acknowledge an operation.
    #[error("replica {addr} failed: {reason}")]
    ReplicaFailed { addr: SocketAddr, reason: String },

    /// Sync replication completed with one or more failed replicas.
    #[error("{failed} of {total} replica(s) failed to acknowledge")]
    Incomplete { failed: usize, total: usize },

    /// Network or socket error while contacting a replica.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;
