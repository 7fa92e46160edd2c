use driftkv_types::Mutation;

use crate::error::{ProtocolError, ProtocolResult};
use crate::escape::{escape, unescape};
use crate::message::{Request, Response};

/// Render a request as a single protocol line, newline included.
pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut line = Vec::new();
    match req {
        Request::Put { key, value } => {
            push_tokens(&mut line, b"PUT", &[key, value]);
        }
        Request::BatchPut { keys, values } => {
            line.extend_from_slice(b"BATCHPUT ");
            push_list(&mut line, keys);
            line.push(b' ');
            push_list(&mut line, values);
        }
        Request::Read { key } => push_tokens(&mut line, b"READ", &[key]),
        Request::ReadRange { start, end } => {
            push_tokens(&mut line, b"READRANGE", &[start, end]);
        }
        Request::Delete { key } => push_tokens(&mut line, b"DELETE", &[key]),
        Request::Replicate(m) => return encode_replicate(m),
    }
    line.push(b'\n');
    line
}

/// Render the replication command line for a mutation, newline included.
pub fn encode_replicate(m: &Mutation) -> Vec<u8> {
    let mut line = b"REPLICATE ".to_vec();
    match m {
        Mutation::Put { key, value } => push_tokens(&mut line, b"PUT", &[key, value]),
        Mutation::BatchPut { keys, values } => {
            line.extend_from_slice(b"BATCHPUT ");
            push_list(&mut line, keys);
            line.push(b' ');
            push_list(&mut line, values);
        }
        Mutation::Delete { key } => push_tokens(&mut line, b"DELETE", &[key]),
    }
    line.push(b'\n');
    line
}

/// Render a response; `Range` spans multiple lines ending in a blank line.
pub fn encode_response(resp: &Response) -> Vec<u8> {
    match resp {
        Response::Ok => b"OK\n".to_vec(),
        Response::NotFound => b"NOT_FOUND\n".to_vec(),
        Response::Value(v) => {
            let mut line = escape(v);
            line.push(b'\n');
            line
        }
        Response::Range(pairs) => {
            let mut out = Vec::new();
            for (key, value) in pairs {
                out.extend_from_slice(&escape(key));
                out.extend_from_slice(b": ");
                out.extend_from_slice(&escape(value));
                out.push(b'\n');
            }
            out.push(b'\n');
            out
        }
        Response::Error(msg) => {
            let mut out = b"ERROR: ".to_vec();
            out.extend_from_slice(msg.as_bytes());
            out.push(b'\n');
            out
        }
    }
}

/// Parse one request line (trailing `\r`/`\n` tolerated).
pub fn parse_request(line: &[u8]) -> ProtocolResult<Request> {
    let line = trim_line(line);
    if line.is_empty() {
        return Err(ProtocolError::EmptyLine);
    }
    let tokens: Vec<&[u8]> = line.split(|&b| b == b' ').collect();

    match tokens[0] {
        b"PUT" => {
            let [key, value] = expect_args::<2>("PUT", &tokens)?;
            Ok(Request::Put {
                key: unescape(key)?,
                value: unescape(value)?,
            })
        }
        b"BATCHPUT" => {
            let [keys, values] = expect_args::<2>("BATCHPUT", &tokens)?;
            let (keys, values) = parse_lists(keys, values)?;
            Ok(Request::BatchPut { keys, values })
        }
        b"READ" => {
            let [key] = expect_args::<1>("READ", &tokens)?;
            Ok(Request::Read { key: unescape(key)? })
        }
        b"READRANGE" => {
            let [start, end] = expect_args::<2>("READRANGE", &tokens)?;
            Ok(Request::ReadRange {
                start: unescape(start)?,
                end: unescape(end)?,
            })
        }
        b"DELETE" => {
            let [key] = expect_args::<1>("DELETE", &tokens)?;
            Ok(Request::Delete { key: unescape(key)? })
        }
        b"REPLICATE" => parse_replicate(&tokens),
        other => Err(ProtocolError::UnknownCommand(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

/// Parse one `<key>: <value>` line of a `READRANGE` response.
pub fn parse_range_line(line: &[u8]) -> ProtocolResult<(Vec<u8>, Vec<u8>)> {
    let line = trim_line(line);
    // Escaped tokens never contain a raw space, so the first ": " is the
    // separator even if the key itself contains colons.
    let sep = line
        .windows(2)
        .position(|w| w == b": ")
        .ok_or(ProtocolError::MalformedRangeLine)?;
    let key = unescape(&line[..sep])?;
    let value = unescape(&line[sep + 2..])?;
    Ok((key, value))
}

fn parse_replicate(tokens: &[&[u8]]) -> ProtocolResult<Request> {
    let sub = *tokens.get(1).ok_or(ProtocolError::Arity {
        command: "REPLICATE",
        expected: 2,
        got: tokens.len() - 1,
    })?;
    let rest = &tokens[1..];
    match sub {
        b"PUT" => {
            let [key, value] = expect_args::<2>("REPLICATE PUT", rest)?;
            Ok(Request::Replicate(Mutation::Put {
                key: unescape(key)?,
                value: unescape(value)?,
            }))
        }
        b"BATCHPUT" => {
            let [keys, values] = expect_args::<2>("REPLICATE BATCHPUT", rest)?;
            let (keys, values) = parse_lists(keys, values)?;
            Ok(Request::Replicate(Mutation::BatchPut { keys, values }))
        }
        b"DELETE" => {
            let [key] = expect_args::<1>("REPLICATE DELETE", rest)?;
            Ok(Request::Replicate(Mutation::Delete {
                key: unescape(key)?,
            }))
        }
        other => Err(ProtocolError::UnknownCommand(format!(
            "REPLICATE {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn parse_lists(keys: &[u8], values: &[u8]) -> ProtocolResult<(Vec<Vec<u8>>, Vec<Vec<u8>>)> {
    let keys: Vec<Vec<u8>> = keys
        .split(|&b| b == b',')
        .map(unescape)
        .collect::<ProtocolResult<_>>()?;
    let values: Vec<Vec<u8>> = values
        .split(|&b| b == b',')
        .map(unescape)
        .collect::<ProtocolResult<_>>()?;
    if keys.len() != values.len() {
        return Err(ProtocolError::BatchMismatch {
            keys: keys.len(),
            values: values.len(),
        });
    }
    Ok((keys, values))
}

/// Extract exactly `N` argument tokens after the command token.
fn expect_args<'a, const N: usize>(
    command: &'static str,
    tokens: &[&'a [u8]],
) -> ProtocolResult<[&'a [u8]; N]> {
    let args = &tokens[1..];
    if args.len() != N {
        return Err(ProtocolError::Arity {
            command,
            expected: N,
            got: args.len(),
        });
    }
    let mut out = [&[] as &[u8]; N];
    out.copy_from_slice(args);
    Ok(out)
}

fn push_tokens(line: &mut Vec<u8>, command: &[u8], args: &[&Vec<u8>]) {
    line.extend_from_slice(command);
    for arg in args {
        line.push(b' ');
        line.extend_from_slice(&escape(arg));
    }
}

fn push_list(line: &mut Vec<u8>, items: &[Vec<u8>]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            line.push(b',');
        }
        line.extend_from_slice(&escape(item));
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut line = line;
    while let [rest @ .., last] = line {
        if *last == b'\n' || *last == b'\r' {
            line = rest;
        } else {
            break;
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(req: Request) {
        let line = encode_request(&req);
        assert_eq!(parse_request(&line).unwrap(), req);
    }

    #[test]
    fn put_roundtrip() {
        roundtrip(Request::Put {
            key: b"alpha".to_vec(),
            value: b"1".to_vec(),
        });
    }

    #[test]
    fn put_with_reserved_bytes() {
        roundtrip(Request::Put {
            key: b"a key,with stuff\n".to_vec(),
            value: vec![0x00, 0x20, 0x25, 0xff],
        });
    }

    #[test]
    fn empty_key_and_value() {
        roundtrip(Request::Put {
            key: Vec::new(),
            value: Vec::new(),
        });
    }

    #[test]
    fn batchput_roundtrip() {
        roundtrip(Request::BatchPut {
            keys: vec![b"a".to_vec(), b"b,c".to_vec()],
            values: vec![b"1 2".to_vec(), b"3".to_vec()],
        });
    }

    #[test]
    fn read_and_delete_roundtrip() {
        roundtrip(Request::Read { key: b"k".to_vec() });
        roundtrip(Request::Delete { key: b"k".to_vec() });
    }

    #[test]
    fn readrange_roundtrip() {
        roundtrip(Request::ReadRange {
            start: b"a".to_vec(),
            end: b"z".to_vec(),
        });
    }

    #[test]
    fn replicate_roundtrips() {
        roundtrip(Request::Replicate(Mutation::Put {
            key: b"k".to_vec(),
            value: b"v".to_vec(),
        }));
        roundtrip(Request::Replicate(Mutation::Delete { key: b"k".to_vec() }));
        roundtrip(Request::Replicate(Mutation::BatchPut {
            keys: vec![b"x".to_vec()],
            values: vec![b"y".to_vec()],
        }));
    }

    #[test]
    fn unknown_command() {
        assert!(matches!(
            parse_request(b"FROB key"),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn arity_errors() {
        assert!(matches!(
            parse_request(b"PUT onlykey"),
            Err(ProtocolError::Arity { command: "PUT", .. })
        ));
        assert!(matches!(
            parse_request(b"READ a b"),
            Err(ProtocolError::Arity { .. })
        ));
    }

    #[test]
    fn batch_mismatch_rejected() {
        assert!(matches!(
            parse_request(b"BATCHPUT a,b 1"),
            Err(ProtocolError::BatchMismatch { keys: 2, values: 1 })
        ));
    }

    #[test]
    fn empty_line_rejected() {
        assert!(matches!(parse_request(b"\n"), Err(ProtocolError::EmptyLine)));
    }

    #[test]
    fn response_encodings() {
        assert_eq!(encode_response(&Response::Ok), b"OK\n");
        assert_eq!(encode_response(&Response::NotFound), b"NOT_FOUND\n");
        assert_eq!(encode_response(&Response::Value(b"v 1".to_vec())), b"v%201\n");
        assert_eq!(
            encode_response(&Response::error("boom")),
            b"ERROR: boom\n"
        );
    }

    #[test]
    fn range_response_terminated_by_blank_line() {
        let resp = Response::Range(vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b: c".to_vec(), b"2".to_vec()),
        ]);
        let bytes = encode_response(&resp);
        let mut lines = bytes.split(|&b| b == b'\n');
        assert_eq!(lines.next().unwrap(), b"a: 1");
        assert_eq!(lines.next().unwrap(), b"b:%20c: 2");
        assert_eq!(lines.next().unwrap(), b"");
    }

    #[test]
    fn range_line_roundtrip() {
        let (k, v) = parse_range_line(b"b:%20c: 2\n").unwrap();
        assert_eq!(k, b"b: c");
        assert_eq!(v, b"2");
    }

    #[test]
    fn range_line_without_separator() {
        assert!(matches!(
            parse_range_line(b"garbage"),
            Err(ProtocolError::MalformedRangeLine)
        ));
    }
}
