//! Tick-to-wall offset estimation.
//!
//! Each sampling iteration brackets one wall-clock read between two counter
//! reads. The tick-domain time elapsed between the two counter reads bounds
//! how far the wall sample could have drifted from the first counter sample,
//! so a candidate is accepted as soon as that gap is within the threshold.
//!
//! # Threading Model
//!
//! - **Readers**: load the offset with `Acquire`, never block
//! - **Recalibrating thread**: holds the busy slot, publishes the offset and
//!   the last wall timestamp with `Release`
//!
//! Each shared value is a single 64-bit atomic, so a reader sees either the
//! value before or after a concurrent pass and never a mix of the two.

use crate::convert::DomainConverter;
use crate::policy::{RecalibrationPolicy, Trigger};
use crate::tick_source::TickSource;
use crate::wall_clock::WallClock;
use crossbeam_utils::{Backoff, CachePadded};
use hubclock_common::config::SyncConfig;
use hubclock_common::metrics::{CalibrationCounters, CalibrationStats};
use hubclock_common::state::CalibrationState;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tracing::{debug, error, info, trace, warn};

/// One accepted (or best-so-far) sampling result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    /// `wall_ns - tick_ns` for this iteration.
    offset_ns: i64,
    /// Tick-domain time between the bracketing counter reads.
    gap_ns: u64,
}

/// Maintains the tick-to-wall offset and recomputes it with bounded error.
#[derive(Debug)]
pub struct OffsetEstimator<T, C> {
    source: T,
    clock: C,
    converter: DomainConverter,
    policy: RecalibrationPolicy,
    gap_threshold_ns: u64,
    max_iterations: u32,
    /// Current estimate such that `wall_ns ≈ tick_ns + offset_ns`.
    offset_ns: CachePadded<AtomicI64>,
    /// Wall timestamp recorded by the last pass.
    last_wall_ns: CachePadded<AtomicI64>,
    /// Held while a pass is sampling.
    busy: CachePadded<AtomicBool>,
    counters: CalibrationCounters,
}

impl<T: TickSource, C: WallClock> OffsetEstimator<T, C> {
    /// Read the counter frequency once and seed the offset with a bootstrap
    /// calibration pass.
    pub fn new(source: T, clock: C, config: &SyncConfig) -> Self {
        let frequency_hz = source.read_frequency_hz();
        let converter = DomainConverter::new(frequency_hz);
        let counters = CalibrationCounters::new();
        if !converter.is_valid() {
            counters.record_anomaly();
            error!(
                frequency_hz,
                "tick counter reports zero frequency, tick-domain times will read as 0"
            );
        }

        let bootstrap_wall_ns = clock.now_ns().unwrap_or_else(|| {
            counters.record_anomaly();
            error!("wall clock unavailable during bootstrap");
            0
        });

        let estimator = Self {
            source,
            clock,
            converter,
            policy: RecalibrationPolicy::from_config(config),
            gap_threshold_ns: config.gap_threshold_ns(),
            max_iterations: config.max_iterations.max(1),
            offset_ns: CachePadded::new(AtomicI64::new(0)),
            last_wall_ns: CachePadded::new(AtomicI64::new(bootstrap_wall_ns)),
            busy: CachePadded::new(AtomicBool::new(false)),
            counters,
        };
        estimator.run_pass(bootstrap_wall_ns);

        info!(
            frequency_hz,
            offset_ns = estimator.offset_ns(),
            interval_ns = estimator.policy.interval_ns(),
            gap_threshold_ns = estimator.gap_threshold_ns,
            "Timestamp synchronizer initialized"
        );
        estimator
    }

    /// Recompute the offset if the policy asks for it (or `force` is set).
    ///
    /// `now_wall_ns` is the wall-clock sample the policy is evaluated
    /// against; it becomes the new last wall timestamp when a pass runs.
    ///
    /// Returns `true` if a calibration pass ran.
    pub fn recalibrate(&self, now_wall_ns: i64, force: bool) -> bool {
        let seen_last = self.last_wall_ns.load(Ordering::Acquire);
        self.recalibrate_from(now_wall_ns, seen_last, force)
    }

    /// Same as [`OffsetEstimator::recalibrate`], with `seen_last` being the
    /// last wall timestamp loaded *before* `now_wall_ns` was sampled.
    ///
    /// If a pass publishes a newer timestamp after that load, this call
    /// skips instead of reading its own older sample as a regression.
    pub fn recalibrate_from(&self, now_wall_ns: i64, seen_last: i64, force: bool) -> bool {
        if now_wall_ns < 0 && !force {
            self.counters.record_anomaly();
            warn!(now_wall_ns, "negative wall-clock sample, keeping offset");
            return false;
        }

        if !self.policy.should_recalibrate(now_wall_ns, seen_last, force) {
            return false;
        }

        if !self.claim(force) {
            // Another thread is mid-pass; its result serves this caller too
            trace!("calibration already in progress, reusing offset");
            return false;
        }

        // A pass that completed while this thread was deciding already
        // covered the trigger; re-evaluating against its timestamp would
        // misread the newer value as a regression.
        let last = self.last_wall_ns.load(Ordering::Acquire);
        let trigger = if force || last == seen_last {
            self.policy.evaluate(now_wall_ns, last, force)
        } else {
            None
        };

        let Some(trigger) = trigger else {
            self.release();
            return false;
        };

        match trigger {
            Trigger::Forced => {
                self.counters.record_forced();
                debug!(now_wall_ns, "forced recalibration");
            }
            Trigger::Regression => {
                self.counters.record_regression();
                warn!(
                    now_wall_ns,
                    last_wall_ns = last,
                    step_ns = last.saturating_sub(now_wall_ns),
                    "wall clock moved backward, recalibrating"
                );
            }
            Trigger::Scheduled => {
                debug!(
                    elapsed_ns = now_wall_ns.saturating_sub(last),
                    "recalibration interval elapsed"
                );
            }
        }

        self.run_pass(now_wall_ns);
        self.release();
        true
    }

    /// Current offset in nanoseconds.
    #[inline]
    pub fn offset_ns(&self) -> i64 {
        self.offset_ns.load(Ordering::Acquire)
    }

    /// Wall timestamp recorded by the last pass.
    #[inline]
    pub fn last_wall_ns(&self) -> i64 {
        self.last_wall_ns.load(Ordering::Acquire)
    }

    /// Whether a pass is sampling right now.
    #[inline]
    pub fn state(&self) -> CalibrationState {
        CalibrationState::from_busy(self.busy.load(Ordering::Acquire))
    }

    /// Snapshot of calibration statistics.
    pub fn stats(&self) -> CalibrationStats {
        self.counters.snapshot()
    }

    /// Converter bound to the frequency read at construction.
    #[inline]
    pub fn converter(&self) -> &DomainConverter {
        &self.converter
    }

    /// Recalibration policy in effect.
    #[inline]
    pub fn policy(&self) -> &RecalibrationPolicy {
        &self.policy
    }

    /// Underlying tick source.
    #[inline]
    pub fn source(&self) -> &T {
        &self.source
    }

    /// Underlying wall clock.
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Take the busy slot. Forced callers wait out an in-flight pass, which
    /// is itself bounded by the iteration budget.
    fn claim(&self, force: bool) -> bool {
        let acquired = if force {
            let backoff = Backoff::new();
            while self
                .busy
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                backoff.snooze();
            }
            true
        } else {
            self.busy
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        };
        if acquired {
            trace!(
                from = %CalibrationState::Calibrated,
                to = %CalibrationState::Recalibrating,
                "calibration state"
            );
        }
        acquired
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
        trace!(
            from = %CalibrationState::Recalibrating,
            to = %CalibrationState::Calibrated,
            "calibration state"
        );
    }

    /// Sample both clocks up to the iteration budget and publish the result.
    ///
    /// Caller must hold the busy slot (or be the constructor).
    fn run_pass(&self, now_wall_ns: i64) {
        let mut best: Option<Sample> = None;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            self.counters.record_iteration();

            let Some(sample) = self.take_sample() else {
                continue;
            };
            trace!(
                iteration = iterations,
                offset_ns = sample.offset_ns,
                gap_ns = sample.gap_ns,
                "calibration sample"
            );

            // Any earlier sample had a gap above the threshold, so an
            // in-threshold sample is also the best one
            if best.map_or(true, |b| sample.gap_ns < b.gap_ns) {
                best = Some(sample);
            }
            if sample.gap_ns <= self.gap_threshold_ns {
                converged = true;
                break;
            }
        }

        let previous_offset = self.offset_ns.load(Ordering::Relaxed);
        let previous_wall = self.last_wall_ns.load(Ordering::Relaxed);

        match best {
            Some(sample) => {
                if !converged {
                    self.counters.record_non_convergence();
                    warn!(
                        iterations,
                        best_gap_ns = sample.gap_ns,
                        gap_threshold_ns = self.gap_threshold_ns,
                        "offset did not converge, using the tightest sample"
                    );
                }
                self.offset_ns.store(sample.offset_ns, Ordering::Release);
                self.counters.record_calibration(Some(sample.gap_ns));
                debug!(
                    offset_ns = sample.offset_ns,
                    offset_diff = sample.offset_ns.saturating_sub(previous_offset),
                    time_diff = now_wall_ns.saturating_sub(previous_wall),
                    iterations,
                    "updated tick-to-wall offset"
                );
            }
            None => {
                self.counters.record_calibration(None);
                error!(
                    iterations,
                    offset_ns = previous_offset,
                    "no valid calibration sample, keeping previous offset"
                );
            }
        }

        self.last_wall_ns.store(now_wall_ns, Ordering::Release);
    }

    /// One bracketed read: counter, wall clock, counter.
    fn take_sample(&self) -> Option<Sample> {
        let start_ns = self.converter.ticks_to_ns(self.source.read_ticks());
        let wall_ns = self.clock.now_ns();
        let end_ns = self.converter.ticks_to_ns(self.source.read_ticks());

        let tick_ns = i64::try_from(start_ns).ok();
        match (tick_ns, wall_ns) {
            (Some(tick_ns), Some(wall_ns)) if wall_ns >= 0 && end_ns >= start_ns => Some(Sample {
                // Both operands are non-negative, so this cannot overflow
                offset_ns: wall_ns - tick_ns,
                gap_ns: end_ns - start_ns,
            }),
            _ => {
                self.counters.record_anomaly();
                error!(
                    start_ns,
                    end_ns,
                    ?wall_ns,
                    "invalid time sample"
                );
                None
            }
        }
    }
}
