//! Interrupt mask backends.

/// Saves and masks the interrupt state of the executing CPU.
///
/// [`IrqLock`](super::IrqLock) calls [`save_and_disable`](Self::save_and_disable)
/// before spinning for the lock and hands the returned state back to
/// [`restore`](Self::restore) when the guard drops. Nested critical sections
/// restore in reverse order, so `restore` must reinstate exactly the state it
/// is given rather than unconditionally unmasking.
pub trait IrqMask {
    /// Opaque interrupt state captured before masking.
    type State: Copy;

    /// Captures the current interrupt state, then masks interrupts.
    fn save_and_disable(&self) -> Self::State;

    /// Reinstates a state previously returned by `save_and_disable`.
    fn restore(&self, state: Self::State);
}

/// Masks interrupts on the local CPU.
///
/// On hosted targets (`target_os != "none"`) there is no interrupt state to
/// manage and both operations are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuIrqMask;

impl IrqMask for CpuIrqMask {
    type State = usize;

    #[inline]
    fn save_and_disable(&self) -> usize {
        save_flags_and_cli()
    }

    #[inline]
    fn restore(&self, state: usize) {
        restore_flags(state);
    }
}

/// A mask that does nothing.
///
/// For host harnesses and for code that already runs with interrupts
/// masked by other means.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIrqMask;

impl IrqMask for NoIrqMask {
    type State = ();

    #[inline]
    fn save_and_disable(&self) {}

    #[inline]
    fn restore(&self, _state: ()) {}
}

// ---------------------------------------------------------------------------
// x86_64: RFLAGS.IF
// ---------------------------------------------------------------------------

#[cfg(all(target_os = "none", target_arch = "x86_64"))]
#[inline]
fn save_flags_and_cli() -> usize {
    let flags: usize;
    // SAFETY: Reading RFLAGS and disabling interrupts is safe in kernel mode.
    unsafe {
        core::arch::asm!(
            "pushfq",
            "pop {}",
            "cli",
            out(reg) flags,
            options(nomem),
        );
    }
    flags
}

#[cfg(all(target_os = "none", target_arch = "x86_64"))]
#[inline]
fn restore_flags(flags: usize) {
    if flags & (1 << 9) != 0 {
        // SAFETY: Re-enabling interrupts is safe; we are restoring a previous state.
        unsafe {
            core::arch::asm!("sti", options(nomem, nostack, preserves_flags));
        }
    }
}

// ---------------------------------------------------------------------------
// AArch64: DAIF
// ---------------------------------------------------------------------------

#[cfg(all(target_os = "none", target_arch = "aarch64"))]
#[inline]
fn save_flags_and_cli() -> usize {
    let flags: usize;
    // SAFETY: Reading DAIF and masking interrupts is safe in kernel mode.
    unsafe {
        core::arch::asm!(
            "mrs {}, DAIF",
            "msr DAIFSet, #0xf",
            out(reg) flags,
            options(nomem, nostack),
        );
    }
    flags
}

#[cfg(all(target_os = "none", target_arch = "aarch64"))]
#[inline]
fn restore_flags(flags: usize) {
    // SAFETY: Restoring DAIF is safe; we are restoring a previous state.
    unsafe {
        core::arch::asm!(
            "msr DAIF, {}",
            in(reg) flags,
            options(nomem, nostack),
        );
    }
}

// ---------------------------------------------------------------------------
// 32-bit ARM, A/R profile: CPSR I and F bits (ARMv5 compatible, no cpsid)
// ---------------------------------------------------------------------------

#[cfg(all(
    target_os = "none",
    target_arch = "arm",
    not(target_feature = "mclass")
))]
#[inline]
fn save_flags_and_cli() -> usize {
    let cpsr: usize;
    // SAFETY: Reading CPSR and setting its I/F bits is safe in a privileged mode.
    unsafe {
        core::arch::asm!(
            "mrs {0}, cpsr",
            "orr {1}, {0}, #0xc0",
            "msr cpsr_c, {1}",
            out(reg) cpsr,
            out(reg) _,
            options(nomem, nostack),
        );
    }
    cpsr
}

#[cfg(all(
    target_os = "none",
    target_arch = "arm",
    not(target_feature = "mclass")
))]
#[inline]
fn restore_flags(cpsr: usize) {
    // SAFETY: Writing back the control byte of a previously read CPSR.
    unsafe {
        core::arch::asm!("msr cpsr_c, {}", in(reg) cpsr, options(nomem, nostack));
    }
}

// ---------------------------------------------------------------------------
// 32-bit ARM, M profile: PRIMASK
// ---------------------------------------------------------------------------

#[cfg(all(target_os = "none", target_arch = "arm", target_feature = "mclass"))]
#[inline]
fn save_flags_and_cli() -> usize {
    let primask: usize;
    // SAFETY: Reading PRIMASK and masking interrupts is safe in privileged mode.
    unsafe {
        core::arch::asm!(
            "mrs {}, PRIMASK",
            "cpsid i",
            out(reg) primask,
            options(nomem, nostack),
        );
    }
    primask
}

#[cfg(all(target_os = "none", target_arch = "arm", target_feature = "mclass"))]
#[inline]
fn restore_flags(primask: usize) {
    if primask & 1 == 0 {
        // SAFETY: Interrupts were enabled when the state was saved.
        unsafe {
            core::arch::asm!("cpsie i", options(nomem, nostack));
        }
    }
}

// ---------------------------------------------------------------------------
// Hosted
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "none"))]
#[inline]
fn save_flags_and_cli() -> usize {
    0
}

#[cfg(not(target_os = "none"))]
#[inline]
fn restore_flags(_flags: usize) {}
