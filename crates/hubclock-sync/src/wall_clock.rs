//! Host wall-clock access.

use nix::time::{clock_gettime, ClockId};
use std::sync::Arc;
use tracing::error;

/// Source of wall-clock nanoseconds since an epoch.
///
/// Monotonic in the absence of external adjustment but permitted to jump
/// in either direction.
pub trait WallClock: Send + Sync {
    /// Current wall-clock time in nanoseconds, or `None` if the read failed
    /// or does not fit in `i64`.
    fn now_ns(&self) -> Option<i64>;
}

impl<C: WallClock + ?Sized> WallClock for Arc<C> {
    #[inline]
    fn now_ns(&self) -> Option<i64> {
        (**self).now_ns()
    }
}

/// `CLOCK_REALTIME`, nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealtimeClock;

impl RealtimeClock {
    /// Create a handle to the system realtime clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl WallClock for RealtimeClock {
    #[allow(clippy::useless_conversion)] // time_t and c_long are 32-bit on arm
    fn now_ns(&self) -> Option<i64> {
        match clock_gettime(ClockId::CLOCK_REALTIME) {
            Ok(ts) => {
                let ns = i128::from(ts.tv_sec()) * 1_000_000_000 + i128::from(ts.tv_nsec());
                i64::try_from(ns).ok()
            }
            Err(e) => {
                error!(%e, "CLOCK_REALTIME read failed");
                None
            }
        }
    }
}
