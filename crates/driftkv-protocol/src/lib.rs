//! Wire protocol for driftkv.
//!
//! Requests and responses travel as newline-delimited, space-separated
//! token lines over TCP. Keys and values are arbitrary byte strings, so
//! every key/value token goes through the [`escape`] scheme before it is
//! placed on a line; the framing bytes (space, newline, comma, percent)
//! can therefore never appear raw inside a token.
//!
//! The same framing carries both the client protocol (`PUT`, `READ`, ...)
//! and the master-to-replica replication protocol (`REPLICATE ...`).

pub mod codec;
pub mod error;
pub mod escape;
pub mod message;

pub use codec::{
    encode_replicate, encode_request, encode_response, parse_range_line, parse_request,
};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{Request, Response, MAX_LINE_SIZE};
