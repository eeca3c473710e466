//! Process-wide timestamp synchronizer.
//!
//! [`TimeSync`] is built once at process start and shared by `Arc` with
//! every sensor handler that stamps or interprets tick-domain timestamps.
//! Every converting query first lets the recalibration policy run against a
//! fresh wall-clock sample, then converts with the (possibly just updated)
//! offset. Queries never fail; degraded precision is logged instead.

use crate::convert::{self, DomainConverter};
use crate::estimator::OffsetEstimator;
use crate::tick_source::{HardwareTickSource, TickSource};
use crate::wall_clock::{RealtimeClock, WallClock};
use hubclock_common::config::SyncConfig;
use hubclock_common::metrics::CalibrationStats;
use hubclock_common::state::CalibrationState;
use tracing::warn;

/// Translates hardware tick timestamps to wall-clock time and back.
#[derive(Debug)]
pub struct TimeSync<T = HardwareTickSource, C = RealtimeClock> {
    estimator: OffsetEstimator<T, C>,
}

impl TimeSync {
    /// Synchronizer over the target's hardware counter and `CLOCK_REALTIME`.
    #[must_use]
    pub fn hardware(config: &SyncConfig) -> Self {
        Self::new(HardwareTickSource::new(), RealtimeClock::new(), config)
    }
}

impl<T: TickSource, C: WallClock> TimeSync<T, C> {
    /// Build a synchronizer; reads the counter frequency and runs the
    /// bootstrap calibration.
    pub fn new(source: T, clock: C, config: &SyncConfig) -> Self {
        Self {
            estimator: OffsetEstimator::new(source, clock, config),
        }
    }

    /// Raw hardware tick count.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.estimator.source().read_ticks()
    }

    /// Counter frequency captured at construction.
    #[inline]
    pub fn frequency_hz(&self) -> u64 {
        self.estimator.converter().frequency_hz()
    }

    /// Current tick-domain time in nanoseconds.
    #[inline]
    pub fn now_tick_domain_ns(&self) -> u64 {
        self.estimator.converter().ticks_to_ns(self.ticks())
    }

    /// Current time in the wall-clock domain, derived from the counter.
    pub fn now_wall_ns(&self) -> i64 {
        self.refresh();
        self.estimator
            .converter()
            .ticks_to_wall_ns(self.ticks(), self.current_offset_ns())
    }

    /// Map a wall-clock timestamp into the tick domain.
    ///
    /// Timestamps from before the counter's origin come out negative, so the
    /// mapping round-trips through [`TimeSync::tick_domain_ns_to_wall_ns`].
    pub fn wall_ns_to_tick_domain_ns(&self, wall_ns: i64) -> i64 {
        self.refresh();
        convert::wall_ns_to_tick_domain_ns(wall_ns, self.current_offset_ns())
    }

    /// Map a tick-domain timestamp into the wall-clock domain.
    pub fn tick_domain_ns_to_wall_ns(&self, tick_ns: i64) -> i64 {
        self.refresh();
        convert::tick_domain_ns_to_wall_ns(tick_ns, self.current_offset_ns())
    }

    /// Map a raw tick count into the wall-clock domain.
    pub fn ticks_to_wall_ns(&self, ticks: u64) -> i64 {
        self.refresh();
        self.estimator
            .converter()
            .ticks_to_wall_ns(ticks, self.current_offset_ns())
    }

    /// Offset currently applied, without side effects.
    #[inline]
    pub fn current_offset_ns(&self) -> i64 {
        self.estimator.offset_ns()
    }

    /// Recompute the offset now, bypassing the schedule.
    ///
    /// Always returns `true`. Waits for an in-flight pass on another thread
    /// to finish first.
    pub fn force_recalibrate(&self) -> bool {
        let now_ns = self.estimator.clock().now_ns().unwrap_or_else(|| {
            warn!("wall clock unavailable, forced pass keeps last timestamp");
            self.estimator.last_wall_ns()
        });
        self.estimator.recalibrate(now_ns, true)
    }

    /// Schedule interval in nanoseconds.
    #[inline]
    pub fn recalibration_interval_ns(&self) -> i64 {
        self.estimator.policy().interval_ns()
    }

    /// Wall timestamp recorded by the last calibration pass.
    #[inline]
    pub fn last_wall_ns(&self) -> i64 {
        self.estimator.last_wall_ns()
    }

    /// Calibration state right now.
    #[inline]
    pub fn state(&self) -> CalibrationState {
        self.estimator.state()
    }

    /// Calibration statistics.
    pub fn stats(&self) -> CalibrationStats {
        self.estimator.stats()
    }

    /// Converter bound to the captured frequency.
    #[inline]
    pub fn converter(&self) -> &DomainConverter {
        self.estimator.converter()
    }

    /// Give the policy a chance to recalibrate against the wall clock.
    ///
    /// The host clock, not the caller's timestamp, drives the policy, so
    /// converting a historical timestamp is never mistaken for a regression.
    /// The recorded timestamp is loaded before the clock is read, so a pass
    /// another reader publishes in between is recognised as newer.
    fn refresh(&self) {
        let seen_last = self.estimator.last_wall_ns();
        match self.estimator.clock().now_ns() {
            Some(now_ns) => {
                self.estimator.recalibrate_from(now_ns, seen_last, false);
            }
            None => warn!("wall clock unavailable, reusing offset"),
        }
    }
}
