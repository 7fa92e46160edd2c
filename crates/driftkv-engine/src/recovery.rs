//! Startup recovery: replay the WAL over the loaded index snapshot.
//!
//! The snapshot is a consistent prefix of history; the WAL holds every
//! mutation since. Applying the log in order makes the index reflect
//! exactly the set of keys surviving all entries. PUTs re-append their
//! record to the data file, so a record that was logged but never written
//! (crash between WAL append and data update) materializes here; a record
//! that was written gains a duplicate that compaction later reclaims.

use tracing::info;

use crate::data_file::DataFile;
use crate::error::EngineResult;
use crate::index::Index;
use crate::wal::{Wal, WalOp};

/// Apply every WAL entry to the data file and index, in log order.
///
/// Returns the number of entries applied. On error the WAL must be left
/// untouched so a restart can repeat recovery; callers only snapshot and
/// truncate after this returns `Ok`.
pub fn replay_wal(wal: &Wal, file: &mut DataFile, index: &mut Index) -> EngineResult<usize> {
    let ops = wal.replay()?;
    let count = ops.len();
    for op in ops {
        match op {
            WalOp::Put { key, value } => {
                let slot = file.append(&key, &value)?;
                index.put(key, slot);
            }
            WalOp::Delete { key } => {
                index.remove(&key);
            }
        }
    }
    if count > 0 {
        info!(entries = count, "wal replayed into index");
    }
    Ok(count)
}
