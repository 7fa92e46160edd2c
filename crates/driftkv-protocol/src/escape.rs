//! Byte-exact token escaping.
//!
//! The wire framing reserves space (token separator), newline and carriage
//! return (line delimiters), comma (batch list separator) and percent (the
//! escape introducer). Those five bytes are encoded as `%XX` with uppercase
//! hex digits; every other byte passes through untouched, so tokens remain
//! compact for text keys while round-tripping arbitrary binary.

use crate::error::{ProtocolError, ProtocolResult};

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn must_escape(b: u8) -> bool {
    matches!(b, b'%' | b' ' | b'\n' | b'\r' | b',')
}

/// Encode a raw byte string into a framing-safe token.
pub fn escape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for &b in raw {
        if must_escape(b) {
            out.push(b'%');
            out.push(HEX[(b >> 4) as usize]);
            out.push(HEX[(b & 0x0f) as usize]);
        } else {
            out.push(b);
        }
    }
    out
}

/// Decode a token back into its raw bytes.
///
/// Rejects truncated (`%`, `%A`) and non-hex (`%ZZ`) escape sequences.
pub fn unescape(token: &[u8]) -> ProtocolResult<Vec<u8>> {
    let mut out = Vec::with_capacity(token.len());
    let mut i = 0;
    while i < token.len() {
        let b = token[i];
        if b == b'%' {
            let hi = token.get(i + 1).and_then(|c| (*c as char).to_digit(16));
            let lo = token.get(i + 2).and_then(|c| (*c as char).to_digit(16));
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    out.push(((hi << 4) | lo) as u8);
                    i += 3;
                }
                _ => return Err(ProtocolError::BadEscape { pos: i }),
            }
        } else {
            out.push(b);
            i += 1;
        }
    }
    Ok(out)
}
