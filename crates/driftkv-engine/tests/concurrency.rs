//! Concurrency tests: readers proceed in parallel, writers are never
//! starved, and racing deleters resolve to a single winner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use driftkv_engine::{Store, StoreConfig};
use driftkv_types::NodeRole;

fn open(dir: &std::path::Path) -> Arc<Store> {
    let mut config = StoreConfig::new(dir);
    config.checkpoint_interval = Duration::from_secs(3600);
    config.compaction.enabled = false;
    Store::open(config, NodeRole::Master, None).unwrap()
}

#[test]
fn concurrent_readers_and_writers_stay_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    for i in 0u32..16 {
        store.put(&i.to_be_bytes(), b"initial").unwrap();
    }

    let mut handles = Vec::new();
    for t in 0u32..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for round in 0u32..50 {
                let key = ((t * 50 + round) % 16).to_be_bytes();
                store.put(&key, &round.to_be_bytes()).unwrap();
            }
        }));
    }
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for round in 0u32..200 {
                let key = (round % 16).to_be_bytes();
                // A read must always find the key; only its value changes.
                assert!(store.read(&key).unwrap().is_some());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Every key still reads back and matches its indexed record.
    for i in 0u32..16 {
        assert!(store.read(&i.to_be_bytes()).unwrap().is_some());
    }
}

#[test]
fn writer_is_not_starved_by_readers() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());
    store.put(b"hot", b"0").unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let _ = store.read(b"hot").unwrap();
                }
            })
        })
        .collect();

    // With continuous read traffic, 50 writes must still finish quickly:
    // a waiting writer blocks newly arriving readers.
    let start = Instant::now();
    for i in 0u32..50 {
        store.put(b"hot", &i.to_be_bytes()).unwrap();
    }
    let elapsed = start.elapsed();

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(
        elapsed < Duration::from_secs(10),
        "writer took {elapsed:?} under read load"
    );
    assert_eq!(store.read(b"hot").unwrap(), Some(49u32.to_be_bytes().to_vec()));
}

#[test]
fn racing_deleters_produce_one_winner() {
    let dir = tempfile::tempdir().unwrap();

    for _ in 0..10 {
        let store = open(dir.path());
        store.put(b"contested", b"v").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.delete(b"contested").unwrap())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1, "exactly one deleter may observe the key");
        assert_eq!(store.read(b"contested").unwrap(), None);
        store.close().unwrap();
    }
}

#[test]
fn concurrent_batches_are_atomic_in_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let mut handles = Vec::new();
    for t in 0u8..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let keys: Vec<Vec<u8>> = (0u8..8).map(|i| vec![t, i]).collect();
            let values: Vec<Vec<u8>> = (0u8..8).map(|i| vec![i]).collect();
            for _ in 0..20 {
                store.batch_put(&keys, &values).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0u8..4 {
        for i in 0u8..8 {
            assert_eq!(store.read(&[t, i]).unwrap(), Some(vec![i]));
        }
    }
}

#[test]
fn reads_run_during_compaction() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::new(dir.path());
    config.checkpoint_interval = Duration::from_secs(3600);
    config.compaction.enabled = false;
    config.compaction.min_file_size = 1;
    config.compaction.dead_ratio = 0.1;
    let store = Store::open(config, NodeRole::Master, None).unwrap();

    for i in 0u32..200 {
        store.put(&i.to_be_bytes(), &[b'a'; 64]).unwrap();
    }
    for i in 0u32..200 {
        store.put(&i.to_be_bytes(), &[b'b'; 64]).unwrap();
    }

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut reads = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let i = (reads % 200) as u32;
                    assert_eq!(store.read(&i.to_be_bytes()).unwrap(), Some(vec![b'b'; 64]));
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    assert!(store.compact_now().unwrap());

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(store.stats().keys, 200);
}
