//! ARMv8 generic timer, virtual counter view.

/// Read `CNTVCT_EL0`.
#[inline]
pub(super) fn read_ticks() -> u64 {
    let val: u64;
    // SAFETY: CNTVCT_EL0 is readable from EL0 whenever the kernel enables
    // user access to the generic timer, which Linux and Android do.
    unsafe {
        core::arch::asm!("mrs {}, cntvct_el0", out(reg) val, options(nomem, nostack, preserves_flags));
    }
    val
}

/// Read `CNTFRQ_EL0`.
#[inline]
pub(super) fn read_frequency_hz() -> u64 {
    let val: u64;
    // SAFETY: CNTFRQ_EL0 is a read-only system register accessible from EL0.
    unsafe {
        core::arch::asm!("mrs {}, cntfrq_el0", out(reg) val, options(nomem, nostack, preserves_flags));
    }
    val
}
