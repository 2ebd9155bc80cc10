//! Time sources and alarms for the high-resolution timer core.
//!
//! A [`Clocksource`] turns a free-running hardware counter into a
//! non-decreasing nanosecond timeline; a [`Clockevent`] converts nanosecond
//! delays into cycles for a one-shot compare interrupt. Both are calibrated
//! with the fixed-point `(mult, shift)` pairs from [`calibrate`].

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod calibrate;
pub mod clockevent;
pub mod clocksource;
pub mod ktime;

pub use calibrate::{MultShift, calc_mult_shift, cyc2ns};
pub use clockevent::{Clockevent, ClockeventCalibration, ClockeventDevice};
pub use clocksource::{Clocksource, ClocksourceCalibration, ClocksourceDevice, CountDirection};
pub use ktime::{Ktime, Timespec};
