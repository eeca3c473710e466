//! Raw monotonic counter for x86_64 hosts.
//!
//! x86_64 has no architectural register holding the TSC frequency, so the
//! kernel's `CLOCK_MONOTONIC_RAW` stands in for the counter. It is never
//! slewed by NTP and is read through the vDSO, and ticks are nanoseconds.

use nix::time::{clock_gettime, ClockId};
use tracing::error;

/// Ticks per second of the raw monotonic counter.
const RAW_MONOTONIC_HZ: u64 = 1_000_000_000;

/// Read `CLOCK_MONOTONIC_RAW` as a nanosecond tick count.
#[inline]
pub(super) fn read_ticks() -> u64 {
    match clock_gettime(ClockId::CLOCK_MONOTONIC_RAW) {
        Ok(ts) => {
            let secs = u64::try_from(ts.tv_sec()).unwrap_or(0);
            let nanos = u64::try_from(ts.tv_nsec()).unwrap_or(0);
            secs.saturating_mul(RAW_MONOTONIC_HZ).saturating_add(nanos)
        }
        Err(e) => {
            error!(%e, "CLOCK_MONOTONIC_RAW read failed");
            0
        }
    }
}

/// Fixed 1 GHz: raw monotonic ticks are nanoseconds.
#[inline]
pub(super) fn read_frequency_hz() -> u64 {
    RAW_MONOTONIC_HZ
}
