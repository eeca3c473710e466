//! Common utilities for acceptance tests.
//!
//! Provides helpers for:
//! - Building synchronizers on the hardware counter
//! - Summarizing derived-vs-realtime skew
//! - Standing in for the sysfs wake lock nodes

#![allow(dead_code)] // Not every test module uses every helper

use hubclock_common::config::{SyncConfig, WakelockConfig};
use hubclock_sync::{RealtimeClock, TimeSync, WallClock};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Skew between derived and system wall time over a run.
#[derive(Debug, Clone, Default)]
pub struct SkewStats {
    /// Smallest absolute skew in nanoseconds.
    pub min_abs_ns: u64,
    /// Largest absolute skew in nanoseconds.
    pub max_abs_ns: u64,
    /// Mean absolute skew in nanoseconds.
    pub mean_abs_ns: u64,
    /// 99th percentile of absolute skew in nanoseconds.
    pub p99_abs_ns: u64,
    /// Number of samples.
    pub samples: u64,
}

impl SkewStats {
    /// Summarize signed skew samples.
    pub fn from_samples(skews: &[i64]) -> Self {
        if skews.is_empty() {
            return Self::default();
        }
        let mut abs: Vec<u64> = skews.iter().map(|s| s.unsigned_abs()).collect();
        abs.sort_unstable();

        let sum: u128 = abs.iter().map(|&v| u128::from(v)).sum();
        let count = abs.len();
        let p99_index = (count * 99 / 100).min(count - 1);

        Self {
            min_abs_ns: abs[0],
            max_abs_ns: abs[count - 1],
            mean_abs_ns: u64::try_from(sum / count as u128).unwrap_or(u64::MAX),
            p99_abs_ns: abs[p99_index],
            samples: count as u64,
        }
    }
}

/// Current `CLOCK_REALTIME` in nanoseconds.
pub fn realtime_ns() -> i64 {
    RealtimeClock::new()
        .now_ns()
        .expect("CLOCK_REALTIME must be readable")
}

/// Hardware synchronizer with the default schedule.
pub fn hardware_sync() -> TimeSync {
    TimeSync::hardware(&SyncConfig::default())
}

/// Hardware synchronizer with a custom recalibration interval.
pub fn hardware_sync_with_interval(interval: Duration) -> TimeSync {
    TimeSync::hardware(&SyncConfig {
        recalibration_interval: interval,
        ..SyncConfig::default()
    })
}

/// Sample derived-vs-realtime skew `count` times.
pub fn measure_skew(sync: &TimeSync, count: usize) -> SkewStats {
    let skews: Vec<i64> = (0..count)
        .map(|_| {
            let derived = sync.now_wall_ns();
            realtime_ns() - derived
        })
        .collect();
    SkewStats::from_samples(&skews)
}

/// Temporary files standing in for the wake lock sysfs nodes.
pub fn fake_wakelock_nodes(name: &str) -> (TempDir, WakelockConfig) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let lock_path = dir.path().join("wake_lock");
    let unlock_path = dir.path().join("wake_unlock");
    File::create(&lock_path).expect("create lock node");
    File::create(&unlock_path).expect("create unlock node");

    let config = WakelockConfig {
        enabled: true,
        name: name.to_string(),
        lock_path,
        unlock_path,
    };
    (dir, config)
}

/// Number of times `name` was written to a fake sysfs node.
pub fn node_writes(path: &Path, name: &str) -> usize {
    std::fs::read_to_string(path)
        .expect("read node")
        .matches(name)
        .count()
}
