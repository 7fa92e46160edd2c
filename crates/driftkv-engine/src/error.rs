use driftkv_replication::ReplicationError;

/// Errors from storage-engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Underlying disk operation failed. Fatal for this operation only;
    /// the store stays up and the client may retry.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAL payload or index snapshot could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A data-file record contradicts the index (stored key mismatch or
    /// lengths pointing outside the file).
    #[error("corrupt record at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    /// Batch keys and values differ in length.
    #[error("batch length mismatch: {keys} key(s), {values} value(s)")]
    BatchMismatch { keys: usize, values: usize },

    /// Sync replication did not reach every healthy replica. The local
    /// write is already durable; only propagation failed.
    #[error("replication failed (write committed locally): {0}")]
    Replication(#[from] ReplicationError),

    /// The store has been closed; no further operations are accepted.
    #[error("store is closed")]
    Closed,
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
