//! Pure conversions between the tick domain and the wall-clock domain.
//!
//! Tick counts become tick-domain nanoseconds through a double-precision
//! multiply, which avoids the overflow of `ticks * 1e9` in integers at the
//! cost of errors on the order of f64 epsilon. Domain shifts by the offset
//! are signed: wall times before the counter's origin map to negative
//! tick-domain times, and only the `i64` limits saturate.

use hubclock_common::time::NSEC_PER_SEC;

/// Tick-to-nanosecond converter bound to one counter frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainConverter {
    /// Counter frequency in Hz.
    frequency_hz: u64,
    /// Nanoseconds per tick, zero for an unusable frequency.
    ns_per_tick: f64,
}

impl DomainConverter {
    /// Create a converter for a counter running at `frequency_hz`.
    ///
    /// A zero frequency yields a converter that maps every tick count to 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(frequency_hz: u64) -> Self {
        let ns_per_tick = if frequency_hz == 0 {
            0.0
        } else {
            NSEC_PER_SEC as f64 / frequency_hz as f64
        };
        Self {
            frequency_hz,
            ns_per_tick,
        }
    }

    /// Counter frequency this converter was built for.
    #[inline]
    #[must_use]
    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    /// Whether the frequency could be used for conversion.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.frequency_hz != 0
    }

    /// Convert a raw tick count to tick-domain nanoseconds.
    #[inline]
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn ticks_to_ns(&self, ticks: u64) -> u64 {
        // Float-to-int `as` saturates at u64::MAX
        (ticks as f64 * self.ns_per_tick) as u64
    }

    /// Convert a raw tick count straight to wall-clock nanoseconds.
    #[inline]
    #[must_use]
    pub fn ticks_to_wall_ns(&self, ticks: u64, offset_ns: i64) -> i64 {
        let tick_ns = i64::try_from(self.ticks_to_ns(ticks)).unwrap_or(i64::MAX);
        tick_domain_ns_to_wall_ns(tick_ns, offset_ns)
    }
}

/// Shift a tick-domain timestamp into the wall-clock domain.
#[inline]
#[must_use]
pub fn tick_domain_ns_to_wall_ns(tick_ns: i64, offset_ns: i64) -> i64 {
    tick_ns.saturating_add(offset_ns)
}

/// Shift a wall-clock timestamp into the tick domain.
///
/// Wall times earlier than the tick counter's origin come out negative.
#[inline]
#[must_use]
pub fn wall_ns_to_tick_domain_ns(wall_ns: i64, offset_ns: i64) -> i64 {
    wall_ns.saturating_sub(offset_ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_second_at_19_2_mhz() {
        let converter = DomainConverter::new(19_200_000);
        assert_eq!(converter.ticks_to_ns(19_200_000), 1_000_000_000);
        assert_eq!(converter.ticks_to_ns(19_200_000 * 60), 60_000_000_000);
    }

    #[test]
    fn test_truncates_fractional_nanoseconds() {
        let converter = DomainConverter::new(19_200_000);
        // 52.083... ns per tick
        assert_eq!(converter.ticks_to_ns(1), 52);
        assert_eq!(converter.ticks_to_ns(3), 156);
    }

    #[test]
    fn test_monotonic_over_sampled_range() {
        let converter = DomainConverter::new(19_200_000);
        let mut prev = 0;
        let mut ticks = 0u64;
        while ticks < u64::MAX / 4 {
            let ns = converter.ticks_to_ns(ticks);
            assert!(ns >= prev, "ticks_to_ns decreased at {ticks}");
            prev = ns;
            ticks = ticks.saturating_mul(3).saturating_add(7);
        }
    }

    #[test]
    fn test_saturates_instead_of_wrapping() {
        // 1 Hz counter: u64::MAX seconds does not fit in nanoseconds
        let converter = DomainConverter::new(1);
        assert_eq!(converter.ticks_to_ns(u64::MAX), u64::MAX);
        assert_eq!(converter.ticks_to_wall_ns(u64::MAX, 5), i64::MAX);
        assert_eq!(tick_domain_ns_to_wall_ns(i64::MAX, 5), i64::MAX);
        assert_eq!(tick_domain_ns_to_wall_ns(10, i64::MIN), i64::MIN + 10);
        assert_eq!(wall_ns_to_tick_domain_ns(i64::MIN, 1), i64::MIN);
    }

    #[test]
    fn test_zero_frequency_maps_to_zero() {
        let converter = DomainConverter::new(0);
        assert!(!converter.is_valid());
        assert_eq!(converter.ticks_to_ns(123_456), 0);
    }

    #[test]
    fn test_offset_shift() {
        // offset 1000: wall 2000 is tick-domain 1000
        assert_eq!(wall_ns_to_tick_domain_ns(2_000, 1_000), 1_000);
        assert_eq!(tick_domain_ns_to_wall_ns(1_000, 1_000), 2_000);
        assert_eq!(tick_domain_ns_to_wall_ns(5_000, -1_500), 3_500);
    }

    #[test]
    fn test_round_trip_is_exact() {
        let offset = 1_700_000_000_123_456_789_i64 - 42_000_000_000;
        for wall in [offset, offset + 1, offset + 999_999_937, i64::MAX - 3] {
            let tick = wall_ns_to_tick_domain_ns(wall, offset);
            assert_eq!(tick_domain_ns_to_wall_ns(tick, offset), wall);
        }
    }

    #[test]
    fn test_round_trip_before_counter_origin() {
        let offset = 1_699_999_999_000_000_000_i64;
        for wall in [0, 1, -1, offset - 1, -1_000_000_000_000, i64::MIN + offset] {
            let tick = wall_ns_to_tick_domain_ns(wall, offset);
            assert!(tick < 0, "wall {wall} should precede the counter origin");
            assert_eq!(tick_domain_ns_to_wall_ns(tick, offset), wall);
        }
        assert_eq!(wall_ns_to_tick_domain_ns(0, offset), -offset);
    }

    #[test]
    fn test_round_trip_with_negative_offset() {
        // Counter origin after the wall epoch reading
        let offset = -5_000;
        for wall in [i64::MAX + offset, 0, -5_000, i64::MIN] {
            let tick = wall_ns_to_tick_domain_ns(wall, offset);
            assert_eq!(tick_domain_ns_to_wall_ns(tick, offset), wall);
        }
    }

    #[test]
    fn test_ticks_to_wall() {
        let converter = DomainConverter::new(1_000_000_000);
        assert_eq!(converter.ticks_to_wall_ns(500, 1_000), 1_500);
    }
}
