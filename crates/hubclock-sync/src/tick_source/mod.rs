//! Free-running hardware tick counter access.
//!
//! Exactly one register backend is compiled in per target architecture:
//!
//! - `aarch64`: single 64-bit virtual counter (`CNTVCT_EL0`, `CNTFRQ_EL0`)
//! - `arm`: CP15 counter read as a 32-bit low/high pair
//! - `x86_64` (Linux/Android): kernel raw monotonic counter at 1 GHz
//!
//! Any other target fails to build.

use std::sync::Arc;

#[cfg(target_arch = "aarch64")]
#[path = "aarch64.rs"]
mod arch;

#[cfg(target_arch = "arm")]
#[path = "arm.rs"]
mod arch;

#[cfg(all(
    target_arch = "x86_64",
    any(target_os = "linux", target_os = "android")
))]
#[path = "x86_64.rs"]
mod arch;

#[cfg(not(any(
    target_arch = "aarch64",
    target_arch = "arm",
    all(
        target_arch = "x86_64",
        any(target_os = "linux", target_os = "android")
    )
)))]
compile_error!("hubclock-sync: no tick counter backend for this target architecture");

/// Source of raw hardware ticks.
///
/// Implementations must be cheap enough to call from sensor callback
/// threads. No side effects beyond the register read.
pub trait TickSource: Send + Sync {
    /// Current counter value.
    fn read_ticks(&self) -> u64;

    /// Counter frequency in Hz.
    fn read_frequency_hz(&self) -> u64;
}

impl<T: TickSource + ?Sized> TickSource for Arc<T> {
    #[inline]
    fn read_ticks(&self) -> u64 {
        (**self).read_ticks()
    }

    #[inline]
    fn read_frequency_hz(&self) -> u64 {
        (**self).read_frequency_hz()
    }
}

/// The counter backend selected for the build target.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareTickSource;

impl HardwareTickSource {
    /// Create a handle to the hardware counter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TickSource for HardwareTickSource {
    #[inline]
    fn read_ticks(&self) -> u64 {
        arch::read_ticks()
    }

    #[inline]
    fn read_frequency_hz(&self) -> u64 {
        arch::read_frequency_hz()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_counter_advances() {
        let source = HardwareTickSource::new();
        let first = source.read_ticks();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = source.read_ticks();
        assert!(second > first, "counter did not advance: {first} -> {second}");
    }

    #[test]
    fn test_hardware_frequency_nonzero() {
        assert!(HardwareTickSource::new().read_frequency_hz() > 0);
    }

    #[test]
    fn test_arc_forwarding() {
        let source: Arc<dyn TickSource> = Arc::new(HardwareTickSource::new());
        assert_eq!(
            source.read_frequency_hz(),
            HardwareTickSource::new().read_frequency_hz()
        );
    }
}
