//! Interrupt-safe spin lock.
//!
//! Masks interrupts before acquiring the inner spinlock and restores the
//! previous interrupt state on release. This prevents deadlocks when a lock
//! is shared between interrupt handlers and normal kernel code.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

use super::irq_mask::{CpuIrqMask, IrqMask};
use super::loom_compat::{AtomicBool, Ordering, spin_loop};

/// A spin lock that masks interrupts while held.
pub struct IrqLock<T, M: IrqMask = CpuIrqMask> {
    locked: AtomicBool,
    mask: M,
    data: UnsafeCell<T>,
}

// SAFETY: The atomic flag ensures exclusive access to `data`; the mask is
// only used through shared references.
unsafe impl<T: Send, M: IrqMask + Send> Send for IrqLock<T, M> {}
// SAFETY: Same reasoning as `Send`; guards hand out `&mut T` one at a time.
unsafe impl<T: Send, M: IrqMask + Sync> Sync for IrqLock<T, M> {}

impl<T> IrqLock<T> {
    /// Creates a new unlocked `IrqLock` that masks the local CPU's interrupts.
    #[cfg(not(loom))]
    pub const fn new(value: T) -> Self {
        Self::with_mask(CpuIrqMask, value)
    }

    /// Creates a new unlocked `IrqLock` that masks the local CPU's interrupts.
    #[cfg(loom)]
    pub fn new(value: T) -> Self {
        Self::with_mask(CpuIrqMask, value)
    }
}

impl<T, M: IrqMask> IrqLock<T, M> {
    /// Creates a new unlocked `IrqLock` using the given mask backend.
    #[cfg(not(loom))]
    pub const fn with_mask(mask: M, value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            mask,
            data: UnsafeCell::new(value),
        }
    }

    /// Creates a new unlocked `IrqLock` using the given mask backend.
    #[cfg(loom)]
    pub fn with_mask(mask: M, value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            mask,
            data: UnsafeCell::new(value),
        }
    }

    /// Returns the mask backend.
    pub fn mask(&self) -> &M {
        &self.mask
    }

    /// Acquires the lock, masking interrupts first.
    pub fn lock(&self) -> IrqLockGuard<'_, T, M> {
        let state = self.mask.save_and_disable();

        // TTAS spin to acquire.
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return IrqLockGuard {
                    lock: self,
                    state,
                    _not_send: PhantomData,
                };
            }
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// Attempts to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<IrqLockGuard<'_, T, M>> {
        let state = self.mask.save_and_disable();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(IrqLockGuard {
                lock: self,
                state,
                _not_send: PhantomData,
            })
        } else {
            // Failed, put the interrupt state back.
            self.mask.restore(state);
            None
        }
    }

    /// Returns a mutable reference to the data without locking.
    ///
    /// Exclusive access is statically guaranteed by `&mut self`.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

/// RAII guard that restores interrupt state on drop.
///
/// Not `Send`: the saved state belongs to the CPU that took the lock.
pub struct IrqLockGuard<'a, T, M: IrqMask = CpuIrqMask> {
    lock: &'a IrqLock<T, M>,
    state: M::State,
    _not_send: PhantomData<*const ()>,
}

impl<T, M: IrqMask> Deref for IrqLockGuard<'_, T, M> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, M: IrqMask> DerefMut for IrqLockGuard<'_, T, M> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The lock is held, so we have exclusive access to the data.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, M: IrqMask> Drop for IrqLockGuard<'_, T, M> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        self.lock.mask.restore(self.state);
    }
}
