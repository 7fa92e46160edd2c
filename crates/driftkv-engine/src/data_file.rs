use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::index::Slot;

/// Bytes of the two big-endian length prefixes ahead of each record.
pub const RECORD_HEADER: usize = 8;

/// Append-only file of `(key_len: u32 BE, value_len: u32 BE, key, value)`
/// records.
///
/// The file performs no locking of its own: callers hold the store's data
/// lock (read for [`read_at`](Self::read_at), write for
/// [`append`](Self::append)). Reads are positional, so any number of
/// readers may hit different offsets through the same handle concurrently.
pub struct DataFile {
    path: PathBuf,
    file: File,
    len: u64,
}

impl DataFile {
    /// Open (or create) the data file at `path`.
    pub fn open(path: &Path) -> EngineResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let len = file.metadata()?.len();
        debug!(path = %path.display(), len, "data file opened");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    /// Append one record at the end of the file. Returns its slot.
    ///
    /// The write goes straight to the OS, so readers in this process see
    /// the record as soon as the index points at it. Durability comes from
    /// the WAL, not from fsyncing here.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> EngineResult<Slot> {
        let offset = self.len;
        let record = encode_record(key, value);
        self.file.write_all(&record)?;
        self.len += record.len() as u64;
        Ok(Slot {
            offset,
            length: record.len() as u32,
        })
    }

    /// Read the record starting at `offset`, returning its stored key and
    /// value. Callers must compare the stored key against the key they
    /// looked up; a mismatch means the index and file disagree.
    pub fn read_at(&self, offset: u64) -> EngineResult<(Vec<u8>, Vec<u8>)> {
        let mut header = [0u8; RECORD_HEADER];
        self.read_exact_at(&mut header, offset)?;
        let key_len = u32::from_be_bytes(header[0..4].try_into().unwrap()) as u64;
        let value_len = u32::from_be_bytes(header[4..8].try_into().unwrap()) as u64;

        let end = offset + RECORD_HEADER as u64 + key_len + value_len;
        if end > self.len {
            return Err(EngineError::Corruption {
                offset,
                reason: format!(
                    "record claims {} bytes but file ends at {}",
                    end - offset,
                    self.len
                ),
            });
        }

        let mut key = vec![0u8; key_len as usize];
        self.read_exact_at(&mut key, offset + RECORD_HEADER as u64)?;
        let mut value = vec![0u8; value_len as usize];
        self.read_exact_at(&mut value, offset + RECORD_HEADER as u64 + key_len)?;
        Ok((key, value))
    }

    /// Current file length in bytes.
    pub fn size(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush file contents to stable storage.
    pub fn sync(&self) -> EngineResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        let mut buf = buf;
        let mut pos = offset;
        while !buf.is_empty() {
            let n = self.file.seek_read(buf, pos)?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            buf = &mut buf[n..];
            pos += n as u64;
        }
        Ok(())
    }
}

/// Encode one record as it is laid out on disk.
pub fn encode_record(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(RECORD_HEADER + key.len() + value.len());
    record.extend_from_slice(&(key.len() as u32).to_be_bytes());
    record.extend_from_slice(&(value.len() as u32).to_be_bytes());
    record.extend_from_slice(key);
    record.extend_from_slice(value);
    record
}
