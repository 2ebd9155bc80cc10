//! Interrupt-safe front end of the timer queue.

use core::sync::atomic::{AtomicI64, Ordering};

use chronon_clock::{ClockeventDevice, ClocksourceDevice, Ktime};
use chronon_core::sync::{CpuIrqMask, IrqLock, IrqLockGuard, IrqMask};

use crate::queue::{StartError, StartStatus, TimerQueue};
use crate::timer::{HrTimerMode, TimerFn, TimerId};

/// A [`TimerQueue`] behind an [`IrqLock`].
///
/// Every method masks interrupts for its whole duration, including the
/// clocksource read, so task code and the clockevent interrupt never observe
/// a half-updated queue or accumulator. Intended to live in a `static`:
///
/// ```ignore
/// static TIMERS: HrTimers<'static, 32> = HrTimers::new();
/// ```
pub struct HrTimers<'d, const N: usize, M: IrqMask = CpuIrqMask> {
    queue: IrqLock<TimerQueue<'d, N>, M>,
}

impl<const N: usize> HrTimers<'_, N> {
    /// Creates an empty timer core that masks the local CPU's interrupts.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_mask(CpuIrqMask)
    }
}

impl<const N: usize> Default for HrTimers<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d, const N: usize, M: IrqMask> HrTimers<'d, N, M> {
    /// Creates an empty timer core using the given mask backend.
    #[must_use]
    pub const fn with_mask(mask: M) -> Self {
        Self {
            queue: IrqLock::with_mask(mask, TimerQueue::new()),
        }
    }

    /// Locks the queue for a sequence of operations.
    pub fn lock(&self) -> IrqLockGuard<'_, TimerQueue<'d, N>, M> {
        self.queue.lock()
    }

    /// See [`TimerQueue::register_clocksource`].
    pub fn register_clocksource(&self, device: &'d dyn ClocksourceDevice, hz: u32) {
        self.lock().register_clocksource(device, hz);
    }

    /// See [`TimerQueue::register_clocksource_khz`].
    pub fn register_clocksource_khz(&self, device: &'d dyn ClocksourceDevice, khz: u32) {
        self.lock().register_clocksource_khz(device, khz);
    }

    /// See [`TimerQueue::register_clockevent`].
    pub fn register_clockevent(&self, device: &'d dyn ClockeventDevice, hz: u32) {
        self.lock().register_clockevent(device, hz);
    }

    /// See [`TimerQueue::claim`].
    pub fn claim(&self) -> Option<TimerId> {
        self.lock().claim()
    }

    /// See [`TimerQueue::release`].
    pub fn release(&self, id: TimerId) {
        self.lock().release(id);
    }

    /// See [`TimerQueue::init`].
    pub fn init(
        &self,
        id: TimerId,
        callback: TimerFn<N>,
        arg: usize,
        time: Ktime,
        mode: HrTimerMode,
    ) {
        self.lock().init(id, callback, arg, time, mode);
    }

    /// See [`TimerQueue::start`].
    ///
    /// # Errors
    ///
    /// As [`TimerQueue::start`].
    pub fn start(
        &self,
        id: TimerId,
        time: Ktime,
        mode: HrTimerMode,
    ) -> Result<StartStatus, StartError> {
        self.lock().start(id, time, mode)
    }

    /// See [`TimerQueue::cancel`].
    pub fn cancel(&self, id: TimerId) -> bool {
        self.lock().cancel(id)
    }

    /// See [`TimerQueue::forward`].
    pub fn forward(&self, id: TimerId, now: Ktime, interval: Ktime) -> u64 {
        self.lock().forward(id, now, interval)
    }

    /// See [`TimerQueue::forward_now`].
    pub fn forward_now(&self, id: TimerId, interval: Ktime) -> u64 {
        self.lock().forward_now(id, interval)
    }

    /// Current time in nanoseconds, `0` until a clocksource is registered.
    pub fn absolute_time(&self) -> Ktime {
        self.lock().absolute_time()
    }

    /// Nanoseconds since the timestamp held in `since`.
    pub fn elapsed_time(&self, since: &AtomicI64) -> Ktime {
        let now = self.absolute_time();
        now.saturating_sub(since.load(Ordering::Acquire))
    }

    /// Stores the current time into `stamp` and returns it.
    pub fn store_absolute_time(&self, stamp: &AtomicI64) -> Ktime {
        let now = self.absolute_time();
        stamp.store(now, Ordering::Release);
        now
    }

    /// Clockevent interrupt entry. Call from the device's ISR.
    pub fn handle_interrupt(&self) {
        self.lock().handle_interrupt();
    }
}

impl<const N: usize, M: IrqMask> core::fmt::Debug for HrTimers<'_, N, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HrTimers").finish_non_exhaustive()
    }
}
