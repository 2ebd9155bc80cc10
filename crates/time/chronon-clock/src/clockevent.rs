//! One-shot compare interrupts.

use core::fmt;

use crate::calibrate::{MIN_DELTA_FLOOR_NS, MultShift, budget_u32, calc_mult_shift, clamp_budget};
use crate::ktime::{Ktime, NSEC_PER_SEC};

/// A programmable one-shot alarm.
///
/// The device's interrupt handler must call back into the timer core (see
/// `HrTimers::handle_interrupt`) once the programmed delay elapses.
pub trait ClockeventDevice: Send + Sync {
    /// Arms the alarm to fire `cycles` device cycles from now.
    fn set_next_event(&self, cycles: u64);

    /// Smallest programmable delay, in cycles.
    fn min_delta_cycles(&self) -> u64;

    /// Largest programmable delay, in cycles.
    fn max_delta_cycles(&self) -> u64;
}

/// Nanosecond-to-cycle calibration of a clockevent device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockeventCalibration {
    /// Nanosecond-to-cycle multiplier.
    pub mult: u32,
    /// Shift applied after multiplying.
    pub shift: u32,
    /// Smallest programmable delay, in cycles.
    pub min_delta_cycles: u64,
    /// Largest programmable delay, in cycles.
    pub max_delta_cycles: u64,
    /// Smallest programmable delay, in nanoseconds (at least 1000).
    pub min_delta_ns: u64,
    /// Largest programmable delay, in nanoseconds.
    pub max_delta_ns: u64,
}

impl ClockeventCalibration {
    /// Calibrates a device running at `freq` Hz with the given programmable
    /// cycle bounds.
    ///
    /// # Panics
    ///
    /// Panics if `freq` is zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(min_delta_cycles: u64, max_delta_cycles: u64, freq: u32) -> Self {
        assert!(freq != 0, "clockevent: zero frequency");

        let sec = clamp_budget(max_delta_cycles / u64::from(freq), max_delta_cycles);
        let MultShift { mult, shift } =
            calc_mult_shift(NSEC_PER_SEC as u32, freq, budget_u32(sec));
        assert!(mult != 0, "clockevent: {freq} Hz is too fast to calibrate");

        let mut cal = Self {
            mult,
            shift,
            min_delta_cycles,
            max_delta_cycles,
            min_delta_ns: 0,
            max_delta_ns: 0,
        };
        cal.min_delta_ns = cal.delta_to_ns(min_delta_cycles, false);
        cal.max_delta_ns = cal.delta_to_ns(max_delta_cycles, true);
        cal
    }

    /// Converts a cycle bound back to nanoseconds.
    ///
    /// Rounds up so the cycle count derived from the result is not below
    /// `cycles`, except for the upper bound where rounding up could exceed
    /// what the device accepts. Results under 1000 ns are floored to 1000.
    fn delta_to_ns(&self, cycles: u64, is_max: bool) -> u64 {
        let mut ns = cycles << self.shift;
        if ns >> self.shift != cycles {
            ns = u64::MAX;
        }

        let rounding = u64::from(self.mult) - 1;
        if u64::MAX - ns > rounding && (!is_max || u64::from(self.mult) <= 1 << self.shift) {
            ns += rounding;
        }

        (ns / u64::from(self.mult)).max(MIN_DELTA_FLOOR_NS)
    }

    /// Converts nanoseconds to device cycles.
    #[must_use]
    pub const fn ns_to_cycles(&self, ns: u64) -> u64 {
        MultShift {
            mult: self.mult,
            shift: self.shift,
        }
        .convert(ns)
    }

    /// Clamps a signed delay into the programmable range. Deadlines already
    /// in the past get the minimum delay.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn clamp_delta(&self, delta: Ktime) -> u64 {
        if delta <= 0 {
            return self.min_delta_ns;
        }
        (delta as u64).min(self.max_delta_ns).max(self.min_delta_ns)
    }
}

/// A registered clockevent device with its calibration.
pub struct Clockevent<'d> {
    device: &'d dyn ClockeventDevice,
    calibration: ClockeventCalibration,
}

impl<'d> Clockevent<'d> {
    /// Calibrates `device`, which runs at `freq` Hz.
    #[must_use]
    pub fn new(device: &'d dyn ClockeventDevice, freq: u32) -> Self {
        let calibration = ClockeventCalibration::new(
            device.min_delta_cycles(),
            device.max_delta_cycles(),
            freq,
        );
        Self {
            device,
            calibration,
        }
    }

    /// The calibration derived at registration.
    #[must_use]
    pub fn calibration(&self) -> &ClockeventCalibration {
        &self.calibration
    }

    /// Smallest programmable delay, in nanoseconds.
    #[must_use]
    pub fn min_delta_ns(&self) -> u64 {
        self.calibration.min_delta_ns
    }

    /// Arms the device `delta` nanoseconds from now, clamped to its range.
    /// Returns the programmed cycle count.
    pub fn program(&self, delta: Ktime) -> u64 {
        let ns = self.calibration.clamp_delta(delta);
        let cycles = self.calibration.ns_to_cycles(ns);
        self.device.set_next_event(cycles);
        cycles
    }
}

impl fmt::Debug for Clockevent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clockevent")
            .field("calibration", &self.calibration)
            .finish_non_exhaustive()
    }
}
