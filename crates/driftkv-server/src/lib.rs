//! TCP server for driftkv.
//!
//! The acceptor listens on one socket for both client traffic and, on
//! replicas, the master's replication stream. Each connection is a task
//! reading newline-delimited requests; storage calls hop to the blocking
//! pool, since the engine underneath is synchronous. Role gating happens
//! here: a master refuses `REPLICATE`, a replica refuses client writes.

pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::{NodeConfig, ReplicationSection};
pub use error::{ServerError, ServerResult};
pub use server::KvServer;
