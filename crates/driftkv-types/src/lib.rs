//! Foundation types for driftkv.
//!
//! This crate provides the small set of types shared by every other driftkv
//! crate: the [`Mutation`] that flows through the write and replication
//! paths, the [`NodeRole`] a process runs as, and [`DisplayBytes`] for
//! rendering arbitrary byte strings in log output.

pub mod bytes;
pub mod mutation;
pub mod role;

pub use bytes::DisplayBytes;
pub use mutation::Mutation;
pub use role::{NodeRole, RoleParseError};
