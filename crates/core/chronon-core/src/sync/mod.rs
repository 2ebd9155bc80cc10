//! Interrupt-masking synchronization.
//!
//! The timer queue is shared between ordinary task context and the
//! clockevent interrupt handler on a single core. [`IrqLock`] serializes the
//! two by masking interrupts for the lifetime of its guard. How interrupts
//! are masked is delegated to an [`IrqMask`] backend.

mod irq_lock;
mod irq_mask;
pub(crate) mod loom_compat;

pub use irq_lock::{IrqLock, IrqLockGuard};
pub use irq_mask::{CpuIrqMask, IrqMask, NoIrqMask};
