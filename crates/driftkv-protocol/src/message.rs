use driftkv_types::Mutation;

/// Upper bound on a single protocol line, including the newline.
///
/// Connections that exceed this are answered with an error and dropped;
/// it bounds per-connection memory on both master and replica.
pub const MAX_LINE_SIZE: usize = 64 * 1024 * 1024;

/// A parsed client or replication request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// `PUT <key> <value>`
    Put { key: Vec<u8>, value: Vec<u8> },
    /// `BATCHPUT <k1,k2,...> <v1,v2,...>`
    BatchPut {
        keys: Vec<Vec<u8>>,
        values: Vec<Vec<u8>>,
    },
    /// `READ <key>`
    Read { key: Vec<u8> },
    /// `READRANGE <start> <end>` — both bounds inclusive, byte order.
    ReadRange { start: Vec<u8>, end: Vec<u8> },
    /// `DELETE <key>`
    Delete { key: Vec<u8> },
    /// `REPLICATE PUT|BATCHPUT|DELETE ...` — master-to-replica only.
    Replicate(Mutation),
}

impl Request {
    /// The wire command name of this request.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Put { .. } => "PUT",
            Self::BatchPut { .. } => "BATCHPUT",
            Self::Read { .. } => "READ",
            Self::ReadRange { .. } => "READRANGE",
            Self::Delete { .. } => "DELETE",
            Self::Replicate(_) => "REPLICATE",
        }
    }

    /// Whether this request mutates store state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Put { .. } | Self::BatchPut { .. } | Self::Delete { .. } | Self::Replicate(_)
        )
    }
}

/// A response to a single request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// `OK`
    Ok,
    /// A found value, as its own line.
    Value(Vec<u8>),
    /// `NOT_FOUND`
    NotFound,
    /// `<key>: <value>` lines terminated by a blank line.
    Range(Vec<(Vec<u8>, Vec<u8>)>),
    /// `ERROR: <message>`
    Error(String),
}

impl Response {
    /// Convenience constructor for error replies.
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into())
    }
}
