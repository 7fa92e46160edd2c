//! Short-lived replication connections.
//!
//! Each operation is forwarded over its own TCP connection: connect, send
//! one `REPLICATE` line, read one response line, close. Connections are
//! deliberately not pooled; replication volume is bounded by the op queue
//! and a fresh socket keeps failure handling per-attempt.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::trace;

use driftkv_protocol::encode_replicate;
use driftkv_types::Mutation;

use crate::error::{ReplicationError, ReplicationResult};

/// Send one mutation to one replica and wait for its `OK`.
///
/// `timeout` bounds the connect and each read/write individually, so a
/// single attempt completes (or fails) in a small multiple of it.
pub fn forward(addr: SocketAddr, op: &Mutation, timeout: Duration) -> ReplicationResult<()> {
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let line = encode_replicate(op);
    let mut writer = &stream;
    writer.write_all(&line)?;
    writer.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut reply = Vec::new();
    reader.read_until(b'\n', &mut reply)?;
    while reply.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
        reply.pop();
    }

    trace!(replica = %addr, op = op.kind(), reply = %String::from_utf8_lossy(&reply), "replication attempt");

    if reply == b"OK" {
        Ok(())
    } else if reply.is_empty() {
        Err(ReplicationError::ReplicaFailed {
            addr,
            reason: "connection closed before reply".to_string(),
        })
    } else {
        Err(ReplicationError::ReplicaFailed {
            addr,
            reason: String::from_utf8_lossy(&reply).into_owned(),
        })
    }
}
