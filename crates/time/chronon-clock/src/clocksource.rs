//! Free-running counters and the absolute-time accumulator.

use core::fmt;

use crate::calibrate::{
    MAX_ADJ_PERCENT, MultShift, budget_u32, calc_mult_shift, clamp_budget, cyc2ns,
};
use crate::ktime::{Ktime, NSEC_PER_SEC};

/// Direction in which a hardware counter moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountDirection {
    /// Counts up and wraps from `mask` to zero.
    #[default]
    Up,
    /// Counts down and wraps from zero to `mask`.
    Down,
}

/// A free-running hardware counter.
pub trait ClocksourceDevice: Send + Sync {
    /// Reads the raw counter value.
    fn read(&self) -> u64;

    /// Bit mask covering the counter width (`0xFFFF_FFFF` for 32 bits).
    fn mask(&self) -> u64;

    /// Counting direction.
    fn direction(&self) -> CountDirection {
        CountDirection::Up
    }
}

/// Cycle-to-nanosecond calibration of a clocksource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClocksourceCalibration {
    /// Cycle-to-nanosecond multiplier.
    pub mult: u32,
    /// Shift applied after multiplying.
    pub shift: u32,
    /// Largest correction `mult` may receive for drift.
    pub max_adj: u32,
    /// Counter width mask.
    pub mask: u64,
    /// Largest cycle delta that converts without overflow.
    pub max_cycles: u64,
    /// Longest interval the time base may go without re-anchoring.
    pub max_idle_ns: u64,
}

impl ClocksourceCalibration {
    /// Calibrates a counter of width `mask` that ticks `freq` times per
    /// `1 / scale` seconds (scale 1 for Hz, 1000 for kHz).
    ///
    /// # Panics
    ///
    /// Panics if `freq` or `scale` is zero, or if `scale` exceeds
    /// one billion.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(mask: u64, freq: u32, scale: u32) -> Self {
        assert!(freq != 0, "clocksource: zero frequency");
        assert!(
            scale != 0 && i64::from(scale) <= NSEC_PER_SEC,
            "clocksource: bad frequency scale {scale}"
        );

        // Keep 12.5% of the counter range as margin against late re-anchoring.
        let sec = clamp_budget(
            (mask - (mask >> 3)) / u64::from(freq) / u64::from(scale),
            mask,
        );
        let to = (NSEC_PER_SEC as u64 / u64::from(scale)) as u32;
        let MultShift {
            mut mult,
            mut shift,
        } = calc_mult_shift(freq, to, budget_u32(sec.saturating_mul(u64::from(scale))));

        let mut max_adj = max_adjustment(mult);
        while mult.checked_add(max_adj).is_none() {
            mult >>= 1;
            shift -= 1;
            max_adj = max_adjustment(mult);
        }

        let max_cycles = (u64::MAX / u64::from(mult + max_adj)).min(mask);
        let max_idle_ns = cyc2ns(max_cycles, mult - max_adj, shift) >> 1;

        Self {
            mult,
            shift,
            max_adj,
            mask,
            max_cycles,
            max_idle_ns,
        }
    }

    /// Converts a cycle delta to nanoseconds.
    #[must_use]
    pub const fn cycles_to_ns(&self, cycles: u64) -> u64 {
        cyc2ns(cycles, self.mult, self.shift)
    }

    /// Unconsumed interval after which [`Clocksource::absolute_time`]
    /// re-anchors.
    #[must_use]
    pub const fn max_idle_ns_half(&self) -> u64 {
        self.max_idle_ns >> 1
    }
}

#[allow(clippy::cast_possible_truncation)]
fn max_adjustment(mult: u32) -> u32 {
    (u64::from(mult) * MAX_ADJ_PERCENT / 100) as u32
}

/// A registered counter plus the state that turns it into absolute time.
///
/// The accumulator is not internally synchronized: callers serialize
/// [`absolute_time`](Self::absolute_time) against the timer interrupt
/// (the timer queue does this by living inside an `IrqLock`).
pub struct Clocksource<'d> {
    device: &'d dyn ClocksourceDevice,
    calibration: ClocksourceCalibration,
    direction: CountDirection,
    cycle_last: u64,
    time_base: Ktime,
}

impl<'d> Clocksource<'d> {
    /// Calibrates `device` and anchors it at its current count, with the
    /// timeline continuing from `time_base`.
    #[must_use]
    pub fn new(device: &'d dyn ClocksourceDevice, freq: u32, scale: u32, time_base: Ktime) -> Self {
        let calibration = ClocksourceCalibration::new(device.mask(), freq, scale);
        Self {
            device,
            calibration,
            direction: device.direction(),
            cycle_last: device.read(),
            time_base,
        }
    }

    /// The calibration derived at registration.
    #[must_use]
    pub fn calibration(&self) -> &ClocksourceCalibration {
        &self.calibration
    }

    /// Returns the current absolute time in nanoseconds.
    ///
    /// Non-decreasing as long as it is called at least once per
    /// `max_idle_ns`. The anchor only moves once the unconsumed interval
    /// exceeds half of that, so back-to-back calls are cheap.
    pub fn absolute_time(&mut self) -> Ktime {
        let now = self.device.read();
        let delta = match self.direction {
            CountDirection::Up => now.wrapping_sub(self.cycle_last),
            CountDirection::Down => self.cycle_last.wrapping_sub(now),
        } & self.calibration.mask;

        let offset = self.calibration.cycles_to_ns(delta);
        let time = self
            .time_base
            .saturating_add(Ktime::try_from(offset).unwrap_or(Ktime::MAX));

        if offset > self.calibration.max_idle_ns_half() {
            self.cycle_last = now;
            self.time_base = time;
        }
        time
    }
}

impl fmt::Debug for Clocksource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clocksource")
            .field("calibration", &self.calibration)
            .field("direction", &self.direction)
            .field("cycle_last", &self.cycle_last)
            .field("time_base", &self.time_base)
            .finish_non_exhaustive()
    }
}
