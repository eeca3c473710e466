//! ARMv7 generic timer through CP15.
//!
//! The 64-bit virtual count is only reachable as two 32-bit halves.

/// Read CNTVCT as a low/high register pair.
#[inline]
pub(super) fn read_ticks() -> u64 {
    let lsb: u32;
    let msb: u32;
    // SAFETY: MRRC of CNTVCT is permitted at PL0 when the kernel enables
    // user access to the virtual counter.
    unsafe {
        core::arch::asm!(
            "mrrc p15, 1, {lsb}, {msb}, c14",
            lsb = out(reg) lsb,
            msb = out(reg) msb,
            options(nomem, nostack, preserves_flags)
        );
    }
    (u64::from(msb) << 32) | u64::from(lsb)
}

/// Read CNTFRQ (32 bits wide on ARMv7).
#[inline]
pub(super) fn read_frequency_hz() -> u64 {
    let val: u32;
    // SAFETY: CNTFRQ is readable at PL0.
    unsafe {
        core::arch::asm!(
            "mrc p15, 0, {val}, c14, c0, 0",
            val = out(reg) val,
            options(nomem, nostack, preserves_flags)
        );
    }
    u64::from(val)
}
