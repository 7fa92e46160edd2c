use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// One logged mutation.
///
/// Batch puts are logged as contiguous `Put` entries, so replay only ever
/// sees these two shapes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Entry header: 4 bytes payload length + 4 bytes CRC32, little-endian.
const HEADER_SIZE: usize = 8;

/// Write-ahead log: a sequential file of length- and CRC-framed entries.
///
/// On-disk format per entry:
///
/// ```text
/// [4 bytes: payload length (LE u32)]
/// [4 bytes: CRC32 of payload (LE u32)]
/// [N bytes: payload (bincode-serialized WalOp)]
/// ```
///
/// Every append is flushed and fsynced before returning, so an
/// acknowledged mutation survives power loss. The WAL holds no lock of its
/// own; the store serializes access through its dedicated WAL mutex.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    len: u64,
}

impl Wal {
    /// Open (or create) the log at `path`, positioned for appending.
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
        debug!(path = %path.display(), len, "wal opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            len,
        })
    }

    /// Append one entry and make it durable.
    pub fn append(&mut self, op: &WalOp) -> EngineResult<()> {
        self.write_entry(op)?;
        self.sync()
    }

    /// Append several entries with a single flush/fsync at the end.
    ///
    /// Used by batch-put: the batch becomes durable as a unit when this
    /// returns. A crash mid-call may leave a durable prefix, which replay
    /// applies like any other unacknowledged tail.
    pub fn append_batch<'a>(&mut self, ops: impl IntoIterator<Item = &'a WalOp>) -> EngineResult<()> {
        for op in ops {
            self.write_entry(op)?;
        }
        self.sync()
    }

    fn write_entry(&mut self, op: &WalOp) -> EngineResult<()> {
        let payload =
            bincode::serialize(op).map_err(|e| EngineError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&payload);
        self.writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.write_all(&payload)?;
        self.len += (HEADER_SIZE + payload.len()) as u64;
        Ok(())
    }

    fn sync(&mut self) -> EngineResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Read every entry from the start of the log, in order.
    ///
    /// Replay stops at the first entry that is short, overruns the file,
    /// or fails its CRC: such an entry is a torn write from a crash, and
    /// nothing after it can be trusted. The valid prefix is returned.
    pub fn replay(&self) -> EngineResult<Vec<WalOp>> {
        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut ops = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let mut header = [0u8; HEADER_SIZE];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let length = u32::from_le_bytes(header[0..4].try_into().unwrap()) as u64;
            let expected_crc = u32::from_le_bytes(header[4..8].try_into().unwrap());

            if offset + HEADER_SIZE as u64 + length > file_len {
                warn!(offset, length, file_len, "torn wal entry, discarding tail");
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated wal entry, discarding tail");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            if crc32fast::hash(&payload) != expected_crc {
                warn!(offset, "wal crc mismatch, discarding tail");
                break;
            }

            match bincode::deserialize::<WalOp>(&payload) {
                Ok(op) => ops.push(op),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable wal entry, discarding tail");
                    break;
                }
            }
            offset += HEADER_SIZE as u64 + length;
        }

        debug!(entries = ops.len(), "wal replay complete");
        Ok(ops)
    }

    /// Atomically empty the log.
    pub fn truncate(&mut self) -> EngineResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.sync_all()?;
        self.writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(&self.path)?,
        );
        self.len = 0;
        debug!("wal truncated");
        Ok(())
    }

    /// Current log length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Seek;
    use std::io::SeekFrom;

    fn put(key: &[u8], value: &[u8]) -> WalOp {
        WalOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    fn temp_wal() -> (tempfile::TempDir, Wal) {
        let dir = tempfile::tempdir().unwrap();
        let wal = Wal::open(&dir.path().join("wal.log")).unwrap();
        (dir, wal)
    }

    #[test]
    fn append_and_replay_in_order() {
        let (_dir, mut wal) = temp_wal();
        wal.append(&put(b"a", b"1")).unwrap();
        wal.append(&WalOp::Delete { key: b"a".to_vec() }).unwrap();
        wal.append(&put(b"b", b"2")).unwrap();

        let ops = wal.replay().unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0], put(b"a", b"1"));
        assert_eq!(ops[1], WalOp::Delete { key: b"a".to_vec() });
        assert_eq!(ops[2], put(b"b", b"2"));
    }

    #[test]
    fn replay_empty_log() {
        let (_dir, wal) = temp_wal();
        assert!(wal.replay().unwrap().is_empty());
    }

    #[test]
    fn replay_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&put(b"k", b"v")).unwrap();
        }
        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.replay().unwrap(), vec![put(b"k", b"v")]);
    }

    #[test]
    fn torn_tail_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let full_len = {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&put(b"first", b"1")).unwrap();
            wal.append(&put(b"second", b"2")).unwrap();
            wal.len()
        };

        // Chop into the middle of the second entry.
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full_len - 3).unwrap();

        let wal = Wal::open(&path).unwrap();
        let ops = wal.replay().unwrap();
        assert_eq!(ops, vec![put(b"first", b"1")]);
    }

    #[test]
    fn corrupt_entry_stops_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal.log");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&put(b"good", b"1")).unwrap();
            wal.append(&put(b"bad", b"2")).unwrap();
            wal.append(&put(b"after", b"3")).unwrap();
        }

        // Flip a payload byte inside the second entry.
        let first_entry_len = {
            let payload = bincode::serialize(&put(b"good", b"1")).unwrap();
            HEADER_SIZE as u64 + payload.len() as u64
        };
        let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(first_entry_len + HEADER_SIZE as u64))
            .unwrap();
        let mut byte = [0u8; 1];
        file.read_exact(&mut byte).unwrap();
        byte[0] ^= 0xff;
        file.seek(SeekFrom::Start(first_entry_len + HEADER_SIZE as u64))
            .unwrap();
        file.write_all(&byte).unwrap();

        // Everything from the corrupt entry on is discarded, even the
        // intact third entry: order could not be trusted otherwise.
        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.replay().unwrap(), vec![put(b"good", b"1")]);
    }

    #[test]
    fn truncate_empties_log() {
        let (_dir, mut wal) = temp_wal();
        wal.append(&put(b"a", b"1")).unwrap();
        assert!(wal.len() > 0);

        wal.truncate().unwrap();
        assert_eq!(wal.len(), 0);
        assert!(wal.replay().unwrap().is_empty());

        // Still usable after truncation.
        wal.append(&put(b"b", b"2")).unwrap();
        assert_eq!(wal.replay().unwrap(), vec![put(b"b", b"2")]);
    }

    #[test]
    fn batch_appends_are_contiguous() {
        let (_dir, mut wal) = temp_wal();
        let ops = vec![put(b"a", b"1"), put(b"b", b"2"), put(b"c", b"3")];
        wal.append_batch(ops.iter()).unwrap();
        assert_eq!(wal.replay().unwrap(), ops);
    }

    #[test]
    fn binary_keys_and_values_roundtrip() {
        let (_dir, mut wal) = temp_wal();
        let key: Vec<u8> = (0u8..=255).collect();
        let value = vec![0u8; 1024];
        wal.append(&put(&key, &value)).unwrap();
        assert_eq!(wal.replay().unwrap(), vec![put(&key, &value)]);
    }
}
