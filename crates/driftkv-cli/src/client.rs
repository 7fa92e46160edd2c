//! One-shot blocking client for the line protocol.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};

use anyhow::Context;

use driftkv_protocol::{encode_request, escape::unescape, parse_range_line, Request, Response};

/// Connect, send one request, and read its full response.
pub fn request(addr: SocketAddr, request: Request) -> anyhow::Result<Response> {
    let stream = TcpStream::connect(addr)
        .with_context(|| format!("cannot connect to driftkv node at {addr}"))?;
    let mut writer = &stream;
    writer.write_all(&encode_request(&request))?;

    let is_range = matches!(request, Request::ReadRange { .. });
    let mut reader = BufReader::new(&stream);
    let line = read_line(&mut reader)?;

    if line == b"OK" {
        return Ok(Response::Ok);
    }
    if line == b"NOT_FOUND" {
        return Ok(Response::NotFound);
    }
    if let Some(msg) = line.strip_prefix(b"ERROR: ") {
        return Ok(Response::Error(String::from_utf8_lossy(msg).into_owned()));
    }

    if is_range {
        // First data line already read; more follow until the blank line.
        let mut pairs = vec![parse_range_line(&line)?];
        loop {
            let next = read_line(&mut reader)?;
            if next.is_empty() {
                break;
            }
            pairs.push(parse_range_line(&next)?);
        }
        Ok(Response::Range(pairs))
    } else {
        Ok(Response::Value(unescape(&line)?))
    }
}

fn read_line(reader: &mut impl BufRead) -> anyhow::Result<Vec<u8>> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    while line.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
        line.pop();
    }
    Ok(line)
}
