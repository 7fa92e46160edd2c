use serde::{Deserialize, Serialize};

/// The role a driftkv process runs as.
///
/// A cluster has exactly one writable [`Master`](NodeRole::Master); any
/// number of read-only [`Replica`](NodeRole::Replica)s follow it. Replicas
/// accept the internal replication protocol and local reads only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Replica,
}

impl NodeRole {
    pub fn is_master(self) -> bool {
        matches!(self, Self::Master)
    }

    pub fn is_replica(self) -> bool {
        matches!(self, Self::Replica)
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Replica => write!(f, "replica"),
        }
    }
}

/// Error for unrecognized role names.
#[derive(Debug, thiserror::Error)]
#[error("unknown node role {0:?} (expected \"master\" or \"replica\")")]
pub struct RoleParseError(String);

impl std::str::FromStr for NodeRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "replica" => Ok(Self::Replica),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}
