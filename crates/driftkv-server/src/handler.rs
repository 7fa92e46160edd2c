use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use driftkv_engine::{EngineError, Store};
use driftkv_protocol::{encode_response, parse_request, Request, Response, MAX_LINE_SIZE};
use driftkv_types::NodeRole;

/// Serve one connection until the peer closes it.
///
/// Requests are processed in order, one response per line. Storage calls
/// run on the blocking pool; the connection task itself only does I/O.
pub async fn handle_connection(store: Arc<Store>, stream: TcpStream) -> std::io::Result<()> {
    let peer = stream.peer_addr().ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();

    loop {
        line.clear();
        // Cap the read so an unterminated line cannot grow without bound.
        let n = {
            let mut limited = (&mut reader).take(MAX_LINE_SIZE as u64 + 1);
            limited.read_until(b'\n', &mut line).await?
        };
        if n == 0 {
            break;
        }
        if line.len() > MAX_LINE_SIZE {
            let oversized = Response::error(format!("line exceeds {MAX_LINE_SIZE} bytes"));
            write_half.write_all(&encode_response(&oversized)).await?;
            break;
        }
        let response = dispatch(&store, &line).await;
        write_half.write_all(&encode_response(&response)).await?;
    }
    debug!(?peer, "connection closed");
    Ok(())
}

/// Parse, role-gate, and execute one request line.
async fn dispatch(store: &Arc<Store>, line: &[u8]) -> Response {
    let request = match parse_request(line) {
        Ok(request) => request,
        Err(e) => return Response::error(e.to_string()),
    };

    if let Some(denied) = role_gate(store.role(), &request) {
        return denied;
    }

    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || execute(&store, request)).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "request task failed");
            Response::error("internal error")
        }
    }
}

/// A master refuses the replication protocol; a replica refuses client
/// mutations. Reads are served by both roles.
fn role_gate(role: NodeRole, request: &Request) -> Option<Response> {
    match (role, request) {
        (NodeRole::Master, Request::Replicate(_)) => Some(Response::error("not a replica")),
        (
            NodeRole::Replica,
            Request::Put { .. } | Request::BatchPut { .. } | Request::Delete { .. },
        ) => Some(Response::error("read-only replica")),
        _ => None,
    }
}

fn execute(store: &Store, request: Request) -> Response {
    match request {
        Request::Put { key, value } => reply_ok(store.put(&key, &value)),
        Request::BatchPut { keys, values } => reply_ok(store.batch_put(&keys, &values)),
        Request::Read { key } => match store.read(&key) {
            Ok(Some(value)) => Response::Value(value),
            Ok(None) => Response::NotFound,
            Err(e) => engine_error(e),
        },
        Request::ReadRange { start, end } => match store.read_range(&start, &end) {
            Ok(pairs) if pairs.is_empty() => Response::NotFound,
            Ok(mut pairs) => {
                // Order is unspecified by the store; sort for stable output.
                pairs.sort();
                Response::Range(pairs)
            }
            Err(e) => engine_error(e),
        },
        Request::Delete { key } => match store.delete(&key) {
            Ok(true) => Response::Ok,
            Ok(false) => Response::NotFound,
            Err(e) => engine_error(e),
        },
        Request::Replicate(op) => reply_ok(store.apply(op)),
    }
}

fn reply_ok(result: Result<(), EngineError>) -> Response {
    match result {
        Ok(()) => Response::Ok,
        Err(e) => engine_error(e),
    }
}

fn engine_error(e: EngineError) -> Response {
    Response::error(e.to_string())
}
