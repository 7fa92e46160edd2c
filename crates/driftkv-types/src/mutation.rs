use serde::{Deserialize, Serialize};

use crate::bytes::DisplayBytes;

/// A single state-changing operation against the store.
///
/// `Mutation` is the unit of the write pipeline: the store commits one
/// locally, the replicator queues it, and the replication protocol carries
/// it to replicas. Keys and values are arbitrary byte strings; the store
/// never interprets them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Set `key` to `value`, overwriting any previous value.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Set `keys[i]` to `values[i]` for every `i`, as one atomic batch.
    ///
    /// Invariant: `keys.len() == values.len()`. Constructed only through
    /// [`Mutation::batch_put`], which checks the arity.
    BatchPut {
        keys: Vec<Vec<u8>>,
        values: Vec<Vec<u8>>,
    },
    /// Remove `key` if present.
    Delete { key: Vec<u8> },
}

impl Mutation {
    /// Build a batch-put, returning `None` on key/value arity mismatch.
    pub fn batch_put(keys: Vec<Vec<u8>>, values: Vec<Vec<u8>>) -> Option<Self> {
        if keys.len() != values.len() {
            return None;
        }
        Some(Self::BatchPut { keys, values })
    }

    /// Lower-case operation name, for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::BatchPut { .. } => "batchput",
            Self::Delete { .. } => "delete",
        }
    }

    /// Number of point writes this mutation expands to.
    pub fn op_count(&self) -> usize {
        match self {
            Self::Put { .. } | Self::Delete { .. } => 1,
            Self::BatchPut { keys, .. } => keys.len(),
        }
    }
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put { key, value } => {
                write!(f, "put {} ({} bytes)", DisplayBytes(key), value.len())
            }
            Self::BatchPut { keys, .. } => write!(f, "batchput x{}", keys.len()),
            Self::Delete { key } => write!(f, "delete {}", DisplayBytes(key)),
        }
    }
}
