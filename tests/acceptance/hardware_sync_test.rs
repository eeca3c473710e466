//! Hardware synchronization acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - Derived wall time agrees with `CLOCK_REALTIME` to within 1 ms
//! - Tick-domain time is monotonic on the real counter
//! - Wall to tick to wall conversion is exact for current timestamps
//! - Forced recalibration always succeeds and keeps the state calibrated

use super::common::{
    hardware_sync, hardware_sync_with_interval, measure_skew, realtime_ns,
};
use hubclock_common::state::CalibrationState;
use std::time::Duration;

/// Derived and system wall time must agree to this bound.
const MAX_SKEW_NS: u64 = 1_000_000;

#[test]
fn test_derived_wall_time_matches_realtime() {
    let sync = hardware_sync();
    let stats = measure_skew(&sync, 1000);

    println!("skew: {stats:?}");
    assert_eq!(stats.samples, 1000);
    assert!(
        stats.p99_abs_ns < MAX_SKEW_NS,
        "p99 skew {} ns exceeds {} ns",
        stats.p99_abs_ns,
        MAX_SKEW_NS
    );
}

#[test]
fn test_tick_domain_is_monotonic() {
    let sync = hardware_sync();
    let mut previous = sync.now_tick_domain_ns();
    for _ in 0..10_000 {
        let now = sync.now_tick_domain_ns();
        assert!(now >= previous, "tick domain went back: {previous} -> {now}");
        previous = now;
    }
}

#[test]
fn test_conversions_round_trip_on_hardware() {
    let sync = hardware_sync();
    for _ in 0..100 {
        let wall = realtime_ns();
        let tick_ns = sync.wall_ns_to_tick_domain_ns(wall);
        assert_eq!(sync.tick_domain_ns_to_wall_ns(tick_ns), wall);
    }
}

#[test]
fn test_raw_ticks_convert_consistently() {
    let sync = hardware_sync();
    let ticks = sync.ticks();
    let via_ticks = sync.ticks_to_wall_ns(ticks);
    let tick_ns = i64::try_from(sync.converter().ticks_to_ns(ticks)).unwrap();
    let via_ns = sync.tick_domain_ns_to_wall_ns(tick_ns);
    assert_eq!(via_ticks, via_ns);
}

#[test]
fn test_forced_recalibration_on_hardware() {
    let sync = hardware_sync();
    for _ in 0..20 {
        assert!(sync.force_recalibrate());
    }

    let stats = sync.stats();
    assert_eq!(stats.forced, 20);
    assert_eq!(stats.calibrations, 21);
    assert!(stats.sampling_iterations >= 21);
    assert_eq!(sync.state(), CalibrationState::Calibrated);
    assert!(stats.min_gap_ns.is_some());
}

#[test]
fn test_short_interval_recalibrates_on_query() {
    let sync = hardware_sync_with_interval(Duration::from_millis(5));
    let before = sync.stats().calibrations;

    std::thread::sleep(Duration::from_millis(20));
    let _ = sync.now_wall_ns();

    assert!(sync.stats().calibrations > before);
}

#[test]
fn test_default_interval_does_not_recalibrate_on_query() {
    let sync = hardware_sync();
    let before = sync.stats().calibrations;
    for _ in 0..100 {
        let _ = sync.now_wall_ns();
    }
    assert_eq!(sync.stats().calibrations, before);
    assert_eq!(sync.recalibration_interval_ns(), 60_000_000_000);
}
