use std::fmt;

/// Longest prefix of a byte string rendered before truncation.
const DISPLAY_LIMIT: usize = 32;

/// Log-friendly rendering of an arbitrary byte string.
///
/// Printable ASCII passes through; everything else is hex-escaped as
/// `\xNN`. Output is truncated to a fixed prefix so multi-megabyte values
/// never end up in log lines.
pub struct DisplayBytes<'a>(pub &'a [u8]);

impl fmt::Display for DisplayBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.0[..self.0.len().min(DISPLAY_LIMIT)];
        for &b in shown {
            if (0x20..0x7f).contains(&b) && b != b'\\' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{}", hex::encode([b]))?;
            }
        }
        if self.0.len() > DISPLAY_LIMIT {
            write!(f, "..({} bytes)", self.0.len())?;
        }
        Ok(())
    }
}
