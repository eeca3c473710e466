//! Nanosecond helpers shared by the synchronizer and its configuration.

use std::time::Duration;

/// Nanoseconds per second.
pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Convert a duration to signed nanoseconds, saturating at `i64::MAX`.
#[must_use]
pub fn duration_to_ns_i64(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Convert a duration to unsigned nanoseconds, saturating at `u64::MAX`.
#[must_use]
pub fn duration_to_ns_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
