//! High-resolution timers for chronon.
//!
//! A fixed pool of one-shot or periodic timers with nanosecond deadlines,
//! kept in deadline order and driven by two pieces of hardware:
//!
//! - a free-running counter ([`ClocksourceDevice`]) that provides the
//!   timeline, see [`HrTimers::absolute_time`];
//! - a one-shot compare unit ([`ClockeventDevice`]) that is always armed for
//!   the earliest deadline and whose interrupt handler calls
//!   [`HrTimers::handle_interrupt`].
//!
//! The [`systick`] module builds the OS tick on top of a periodic timer.
//!
//! # Usage
//!
//! ```ignore
//! static TIMERS: HrTimers<'static, 16> = HrTimers::new();
//!
//! TIMERS.register_clocksource(&COUNTER, 24_000_000);
//! TIMERS.register_clockevent(&COMPARE, 24_000_000);
//!
//! let id = TIMERS.claim().unwrap();
//! TIMERS.init(id, on_timeout, 0, 0, HrTimerMode::Relative);
//! TIMERS.start(id, 10 * NSEC_PER_MSEC, HrTimerMode::Relative)?;
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod config;
mod hrtimers;
mod queue;
pub mod systick;
mod timer;

#[cfg(test)]
mod testutil;

pub use chronon_clock::{ClockeventDevice, ClocksourceDevice, CountDirection, Ktime, Timespec};
pub use hrtimers::HrTimers;
pub use queue::{QueueConfig, Resync, StartError, StartStatus, TimerContext, TimerQueue};
pub use timer::{HrTimerMode, HrTimerRestart, TimerFn, TimerId, TimerState};
