//! Storage engine for driftkv.
//!
//! A [`Store`] combines four durable pieces under a two-lock concurrency
//! discipline:
//!
//! - an append-only [data file](data_file::DataFile) of key/value records,
//! - a [write-ahead log](wal::Wal) that makes every mutation durable before
//!   the data file sees it,
//! - an in-memory [index](index::Index) mapping each live key to its record,
//!   periodically snapshotted to disk,
//! - and, on the master, a replication pipeline fed after local commit.
//!
//! The WAL mutex and the data read-write lock are independent: WAL order and
//! data-file order may disagree for concurrent writers, and recovery replays
//! the WAL as the single source of truth. Background workers checkpoint the
//! index and compact the data file without stopping traffic.

pub mod config;
pub mod data_file;
pub mod error;
pub mod index;
pub mod store;
pub mod wal;

mod compactor;
mod recovery;
mod worker;

pub use config::{CompactionConfig, StoreConfig};
pub use error::{EngineError, EngineResult};
pub use index::Slot;
pub use store::{Store, StoreStats};
pub use wal::WalOp;
