use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// Location of one live record in the data file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// File position of the record's first header byte.
    pub offset: u64,
    /// Total record length: header, key, and value.
    pub length: u32,
}

/// In-memory map from key to the record holding its current value.
///
/// A plain hash map: point lookups are O(1) and range reads scan every
/// entry. The map is not internally synchronized; the store's data lock
/// governs all access. [`save`](Self::save) and [`load`](Self::load)
/// persist a snapshot so recovery rarely starts from an empty map.
#[derive(Debug, Default)]
pub struct Index {
    map: HashMap<Vec<u8>, Slot>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, slot: Slot) {
        self.map.insert(key, slot);
    }

    pub fn get(&self, key: &[u8]) -> Option<Slot> {
        self.map.get(key).copied()
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Slot> {
        self.map.remove(key)
    }

    /// All entries whose key lies in the closed interval `[start, end]`
    /// under byte comparison. Scans the whole map; order is unspecified.
    pub fn range(&self, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Slot)> {
        self.map
            .iter()
            .filter(|(k, _)| k.as_slice() >= start && k.as_slice() <= end)
            .map(|(k, s)| (k.clone(), *s))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Total bytes of the data file referenced by live entries.
    pub fn live_bytes(&self) -> u64 {
        self.map.values().map(|s| s.length as u64).sum()
    }

    /// Iterate over entries (used by compaction under the data lock).
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Slot)> {
        self.map.iter()
    }

    /// Owned copy of every entry (the compactor's phase-one snapshot).
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Slot)> {
        self.map.iter().map(|(k, s)| (k.clone(), *s)).collect()
    }

    /// Replace the whole mapping (compaction swap).
    pub fn replace(&mut self, map: HashMap<Vec<u8>, Slot>) {
        self.map = map;
    }

    /// Write a complete snapshot to `path` atomically: serialize into a
    /// temp file in the same directory, fsync, then rename over the
    /// destination.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let bytes = bincode::serialize(&self.map)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!(entries = self.map.len(), path = %path.display(), "index snapshot saved");
        Ok(())
    }

    /// Load the snapshot at `path`. A missing or undecodable snapshot
    /// yields an empty index; WAL replay repairs the difference.
    pub fn load(path: &Path) -> Self {
        let map = match File::open(path) {
            Ok(file) => match bincode::deserialize_from(file) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "malformed index snapshot, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        debug!(entries = map.len(), "index loaded");
        Self { map }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(offset: u64, length: u32) -> Slot {
        Slot { offset, length }
    }

    #[test]
    fn point_operations() {
        let mut index = Index::new();
        index.put(b"k".to_vec(), slot(0, 10));
        assert_eq!(index.get(b"k"), Some(slot(0, 10)));

        index.put(b"k".to_vec(), slot(10, 12));
        assert_eq!(index.get(b"k"), Some(slot(10, 12)));
        assert_eq!(index.len(), 1);

        assert_eq!(index.remove(b"k"), Some(slot(10, 12)));
        assert_eq!(index.get(b"k"), None);
        assert_eq!(index.remove(b"k"), None);
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let mut index = Index::new();
        for (i, key) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
            index.put(key.to_vec(), slot(i as u64, 1));
        }
        let mut keys: Vec<Vec<u8>> = index.range(b"b", b"c").into_iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn range_with_byte_comparison() {
        let mut index = Index::new();
        index.put(vec![0x01], slot(0, 1));
        index.put(vec![0x7f], slot(1, 1));
        index.put(vec![0xff], slot(2, 1));
        let hits = index.range(&[0x02], &[0xff]);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn live_bytes_sums_lengths() {
        let mut index = Index::new();
        index.put(b"a".to_vec(), slot(0, 100));
        index.put(b"b".to_vec(), slot(100, 50));
        assert_eq!(index.live_bytes(), 150);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        let mut index = Index::new();
        index.put(b"alpha".to_vec(), slot(0, 14));
        index.put(vec![0xde, 0xad], slot(14, 20));
        index.save(&path).unwrap();

        let loaded = Index::load(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(b"alpha"), Some(slot(0, 14)));
        assert_eq!(loaded.get(&[0xde, 0xad]), Some(slot(14, 20)));
    }

    #[test]
    fn load_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = Index::load(&dir.path().join("nope.db"));
        assert!(index.is_empty());
    }

    #[test]
    fn load_malformed_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        std::fs::write(&path, b"this is not bincode at all............").unwrap();
        let index = Index::load(&path);
        assert!(index.is_empty());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        let mut index = Index::new();
        index.put(b"old".to_vec(), slot(0, 1));
        index.save(&path).unwrap();

        index.remove(b"old");
        index.put(b"new".to_vec(), slot(1, 2));
        index.save(&path).unwrap();

        let loaded = Index::load(&path);
        assert_eq!(loaded.get(b"old"), None);
        assert_eq!(loaded.get(b"new"), Some(slot(1, 2)));
    }
}
