//! Worker and wake lock acceptance tests.
//!
//! Mirrors the daemon's sampling loop: samples run on a worker thread,
//! each under a wake guard, against a shared synchronizer.

use super::common::{fake_wakelock_nodes, hardware_sync, node_writes};
use hubclock_runtime::{Wakelock, Worker};
use std::sync::{mpsc, Arc};
use std::time::Duration;

#[test]
fn test_worker_samples_under_wake_guard() {
    let (_dir, config) = fake_wakelock_nodes("hubclock_acceptance");
    let lock = Arc::new(Wakelock::open(&config).unwrap());
    let sync = Arc::new(hardware_sync());
    let worker = Worker::spawn("acceptance-worker").unwrap();
    let (tx, rx) = mpsc::channel();

    for _ in 0..10 {
        let lock = Arc::clone(&lock);
        let sync = Arc::clone(&sync);
        let tx = tx.clone();
        worker
            .add_task(move || {
                let _guard = lock.guard().unwrap();
                tx.send((lock.is_held(), sync.now_wall_ns())).unwrap();
            })
            .unwrap();
    }
    drop(tx);
    worker.shutdown();

    let samples: Vec<(bool, i64)> = rx.iter().collect();
    assert_eq!(samples.len(), 10);
    assert!(samples.iter().all(|(held, _)| *held));
    // Samples were taken in order on one thread
    assert!(samples.windows(2).all(|w| w[0].1 <= w[1].1));

    // Each sample took and dropped the kernel lock
    assert!(!lock.is_held());
    assert_eq!(node_writes(&config.lock_path, "hubclock_acceptance"), 10);
    assert_eq!(node_writes(&config.unlock_path, "hubclock_acceptance"), 10);
}

#[test]
fn test_nested_guards_take_lock_once() {
    let (_dir, config) = fake_wakelock_nodes("nested");
    let lock = Wakelock::open(&config).unwrap();
    {
        let _outer = lock.guard().unwrap();
        let _inner = lock.guard().unwrap();
        assert_eq!(lock.count(), 2);
    }
    assert_eq!(node_writes(&config.lock_path, "nested"), 1);
    assert_eq!(node_writes(&config.unlock_path, "nested"), 1);
}

#[test]
fn test_worker_survives_failing_sample() {
    let sync = Arc::new(hardware_sync());
    let worker = Worker::spawn("resilient").unwrap();
    let (tx, rx) = mpsc::channel();

    worker.add_task(|| panic!("sensor handler failed")).unwrap();
    let task_sync = Arc::clone(&sync);
    worker
        .add_task(move || tx.send(task_sync.force_recalibrate()).unwrap())
        .unwrap();

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert_eq!(worker.panicked_tasks(), 1);
    worker.shutdown();
    assert_eq!(sync.stats().forced, 1);
}
