//! Recalibration scheduling.

use hubclock_common::config::SyncConfig;
use std::fmt;

/// Reason a calibration pass was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Caller bypassed the schedule.
    Forced,
    /// Wall clock stepped backward since the last pass.
    Regression,
    /// The recalibration interval elapsed.
    Scheduled,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => write!(f, "forced"),
            Self::Regression => write!(f, "regression"),
            Self::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// Decides whether the current offset must be recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecalibrationPolicy {
    interval_ns: i64,
}

impl RecalibrationPolicy {
    /// Create a policy with the given schedule interval.
    #[must_use]
    pub fn new(interval_ns: i64) -> Self {
        Self { interval_ns }
    }

    /// Create a policy from the synchronizer configuration.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.interval_ns())
    }

    /// Schedule interval in nanoseconds.
    #[inline]
    #[must_use]
    pub fn interval_ns(&self) -> i64 {
        self.interval_ns
    }

    /// Classify the wall-clock sample `now_ns` against the one recorded at
    /// the last pass.
    ///
    /// A backward step always triggers, regardless of how recently the last
    /// pass ran.
    #[inline]
    #[must_use]
    pub fn evaluate(&self, now_ns: i64, last_ns: i64, force: bool) -> Option<Trigger> {
        if force {
            Some(Trigger::Forced)
        } else if now_ns < last_ns {
            Some(Trigger::Regression)
        } else if now_ns.saturating_sub(last_ns) >= self.interval_ns {
            Some(Trigger::Scheduled)
        } else {
            None
        }
    }

    /// Whether a pass is due.
    #[inline]
    #[must_use]
    pub fn should_recalibrate(&self, now_ns: i64, last_ns: i64, force: bool) -> bool {
        self.evaluate(now_ns, last_ns, force).is_some()
    }
}

impl Default for RecalibrationPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
