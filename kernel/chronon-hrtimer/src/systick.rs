//! The OS tick.
//!
//! A periodic high-resolution timer that counts ticks and calls a
//! scheduler hook every period. Install the hook with [`set_tick_hook`],
//! then start the tick once the clock devices are registered:
//!
//! ```ignore
//! let tick = systick::start_default_systick(&mut TIMERS.lock());
//! ```

use core::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use chronon_clock::Ktime;
use chronon_clock::ktime::NSEC_PER_SEC;

use crate::config;
use crate::queue::{TimerContext, TimerQueue};
use crate::timer::{HrTimerMode, HrTimerRestart, TimerId};

/// Called from the tick interrupt, after the tick counter is incremented.
pub type TickHook = fn();

fn null_hook() {}

static TICK_HOOK: AtomicPtr<()> = AtomicPtr::new(null_hook as *mut ());

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Installs the tick hook.
///
/// # Safety
///
/// `hook` runs in interrupt context with interrupts masked and the timer
/// queue locked; it must neither block nor touch the timer core.
pub unsafe fn set_tick_hook(hook: TickHook) {
    TICK_HOOK.store(hook as *mut (), Ordering::Release);
}

fn load_tick_hook() -> TickHook {
    let ptr = TICK_HOOK.load(Ordering::Acquire);
    // SAFETY: TICK_HOOK only ever holds `null_hook` or a `TickHook` passed
    // to `set_tick_hook`, both valid `fn()` pointers.
    unsafe { core::mem::transmute::<*mut (), TickHook>(ptr) }
}

/// Ticks elapsed since boot.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Tick period in nanoseconds for a `tick_hz` tick.
///
/// # Panics
///
/// Panics if `tick_hz` is zero.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn tick_period_ns(tick_hz: u32) -> Ktime {
    assert!(tick_hz != 0, "systick: zero tick frequency");
    NSEC_PER_SEC / tick_hz as Ktime
}

#[allow(clippy::cast_possible_wrap)]
fn on_tick<const N: usize>(ctx: &mut TimerContext<'_, '_, N>, period: usize) -> HrTimerRestart {
    TICKS.fetch_add(1, Ordering::Relaxed);
    load_tick_hook()();
    let _ = ctx.forward_now(period as Ktime);
    HrTimerRestart::Restart
}

/// Starts a `tick_hz` tick on a timer claimed from `queue`. Returns `None`
/// if the pool is exhausted.
///
/// # Panics
///
/// Panics if `tick_hz` is zero.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn start_systick<const N: usize>(
    queue: &mut TimerQueue<'_, N>,
    tick_hz: u32,
) -> Option<TimerId> {
    let period = tick_period_ns(tick_hz);
    let id = queue.claim()?;
    queue.init(id, on_tick::<N>, period as usize, period, HrTimerMode::Relative);
    if queue.start(id, period, HrTimerMode::Relative).is_err() {
        queue.release(id);
        return None;
    }
    Some(id)
}

/// [`start_systick`] at [`TICK_PER_SECOND`](config::TICK_PER_SECOND).
pub fn start_default_systick<const N: usize>(queue: &mut TimerQueue<'_, N>) -> Option<TimerId> {
    start_systick(queue, config::TICK_PER_SECOND)
}
