//! Calibration statistics for the timestamp synchronizer.
//!
//! Counters are written only by the thread holding the recalibration slot
//! and may be read from any thread, so every field is an atomic and reads
//! never block.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live calibration counters shared between the recalibrating thread and readers.
#[derive(Debug)]
pub struct CalibrationCounters {
    /// Completed calibration passes (including the bootstrap pass).
    calibrations: AtomicU64,
    /// Passes that bypassed the schedule.
    forced: AtomicU64,
    /// Passes triggered by a backward wall-clock step.
    regressions: AtomicU64,
    /// Passes that exhausted the iteration budget.
    non_convergent: AtomicU64,
    /// Implausible tick, frequency or wall-clock readings.
    anomalies: AtomicU64,
    /// Sampling iterations across all passes.
    sampling_iterations: AtomicU64,
    /// Gap of the most recently accepted candidate in nanoseconds.
    last_gap_ns: AtomicU64,
    /// Smallest accepted gap in nanoseconds.
    min_gap_ns: AtomicU64,
    /// Largest accepted gap in nanoseconds.
    max_gap_ns: AtomicU64,
}

impl Default for CalibrationCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationCounters {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calibrations: AtomicU64::new(0),
            forced: AtomicU64::new(0),
            regressions: AtomicU64::new(0),
            non_convergent: AtomicU64::new(0),
            anomalies: AtomicU64::new(0),
            sampling_iterations: AtomicU64::new(0),
            last_gap_ns: AtomicU64::new(0),
            min_gap_ns: AtomicU64::new(u64::MAX),
            max_gap_ns: AtomicU64::new(0),
        }
    }

    /// Record a completed pass and the gap of the candidate it accepted.
    pub fn record_calibration(&self, accepted_gap_ns: Option<u64>) {
        self.calibrations.fetch_add(1, Ordering::Relaxed);
        if let Some(gap) = accepted_gap_ns {
            self.last_gap_ns.store(gap, Ordering::Relaxed);
            self.min_gap_ns.fetch_min(gap, Ordering::Relaxed);
            self.max_gap_ns.fetch_max(gap, Ordering::Relaxed);
        }
    }

    /// Record a pass that bypassed the schedule.
    pub fn record_forced(&self) {
        self.forced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a detected backward wall-clock step.
    pub fn record_regression(&self) {
        self.regressions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a pass that did not meet the gap threshold.
    pub fn record_non_convergence(&self) {
        self.non_convergent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an implausible hardware or clock reading.
    pub fn record_anomaly(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one sampling iteration.
    #[inline]
    pub fn record_iteration(&self) {
        self.sampling_iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    ///
    /// Fields are read independently; a snapshot taken during a pass may mix
    /// values from before and after it.
    #[must_use]
    pub fn snapshot(&self) -> CalibrationStats {
        let min_gap = self.min_gap_ns.load(Ordering::Relaxed);
        let calibrations = self.calibrations.load(Ordering::Relaxed);
        CalibrationStats {
            calibrations,
            forced: self.forced.load(Ordering::Relaxed),
            regressions: self.regressions.load(Ordering::Relaxed),
            non_convergent: self.non_convergent.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            sampling_iterations: self.sampling_iterations.load(Ordering::Relaxed),
            last_gap_ns: (min_gap != u64::MAX).then(|| self.last_gap_ns.load(Ordering::Relaxed)),
            min_gap_ns: (min_gap != u64::MAX).then_some(min_gap),
            max_gap_ns: (min_gap != u64::MAX).then(|| self.max_gap_ns.load(Ordering::Relaxed)),
        }
    }
}

/// Snapshot of calibration counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CalibrationStats {
    /// Completed calibration passes.
    pub calibrations: u64,
    /// Forced passes.
    pub forced: u64,
    /// Regression-triggered passes.
    pub regressions: u64,
    /// Non-convergent passes.
    pub non_convergent: u64,
    /// Hardware or clock read anomalies.
    pub anomalies: u64,
    /// Total sampling iterations.
    pub sampling_iterations: u64,
    /// Gap of the last accepted candidate.
    pub last_gap_ns: Option<u64>,
    /// Smallest accepted gap.
    pub min_gap_ns: Option<u64>,
    /// Largest accepted gap.
    pub max_gap_ns: Option<u64>,
}

impl CalibrationStats {
    /// Mean sampling iterations per pass.
    #[must_use]
    pub fn mean_iterations(&self) -> Option<f64> {
        if self.calibrations > 0 {
            #[allow(clippy::cast_precision_loss)]
            Some(self.sampling_iterations as f64 / self.calibrations as f64)
        } else {
            None
        }
    }
}
