//! Concurrency acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - Readers never observe an offset other than one published by a pass
//! - At most one pass runs at a time; forced passes are never lost
//! - Readers keep converting while recalibration is in flight

use super::common::{hardware_sync, realtime_ns};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn test_forced_passes_from_many_threads_all_complete() {
    let sync = Arc::new(hardware_sync());
    let threads = 4;
    let per_thread = 50;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let sync = Arc::clone(&sync);
            thread::spawn(move || {
                for _ in 0..per_thread {
                    assert!(sync.force_recalibrate());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = sync.stats();
    assert_eq!(stats.forced, threads * per_thread);
    assert_eq!(stats.calibrations, threads * per_thread + 1);
}

#[test]
fn test_readers_only_see_published_offsets() {
    let sync = Arc::new(hardware_sync());
    let published = Arc::new(Mutex::new(HashSet::from([sync.current_offset_ns()])));
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let sync = Arc::clone(&sync);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut seen = HashSet::new();
                while !stop.load(Ordering::Relaxed) {
                    seen.insert(sync.current_offset_ns());
                }
                seen
            })
        })
        .collect();

    for _ in 0..100 {
        sync.force_recalibrate();
        published.lock().unwrap().insert(sync.current_offset_ns());
    }
    stop.store(true, Ordering::Relaxed);

    let published = published.lock().unwrap();
    for reader in readers {
        for offset in reader.join().unwrap() {
            assert!(
                published.contains(&offset),
                "reader saw unpublished offset {offset}"
            );
        }
    }
}

#[test]
fn test_conversions_stay_accurate_during_recalibration() {
    let sync = Arc::new(hardware_sync());
    let stop = Arc::new(AtomicBool::new(false));

    let recalibrator = {
        let sync = Arc::clone(&sync);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                sync.force_recalibrate();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let sync = Arc::clone(&sync);
            thread::spawn(move || {
                for _ in 0..2000 {
                    let derived = sync.now_wall_ns();
                    let skew = (realtime_ns() - derived).abs();
                    assert!(skew < 10_000_000, "skew {skew} ns during recalibration");
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    recalibrator.join().unwrap();
}
