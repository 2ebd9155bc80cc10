//! Fixed-point frequency conversion.
//!
//! A value counted at one frequency converts to another as
//! `(value * mult) >> shift`. [`calc_mult_shift`] picks the largest `shift`
//! (best precision) whose `mult` still lets any value covering `max_sec`
//! seconds be multiplied without overflowing 64 bits.

/// Upper bound on the conversion budget of counters wider than 32 bits.
pub const MAX_UPDATE_LENGTH_SECS: u64 = 600;

/// Drift-correction headroom, as a percentage of `mult`.
pub const MAX_ADJ_PERCENT: u64 = 11;

/// Smallest delay a clockevent is ever asked to program, in nanoseconds.
pub const MIN_DELTA_FLOOR_NS: u64 = 1_000;

/// A `(mult, shift)` conversion factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultShift {
    /// Fixed-point multiplier.
    pub mult: u32,
    /// Right shift applied after multiplying.
    pub shift: u32,
}

impl MultShift {
    /// Converts `value`, saturating at `u64::MAX`.
    #[must_use]
    pub const fn convert(self, value: u64) -> u64 {
        cyc2ns(value, self.mult, self.shift)
    }
}

/// Computes `(cycles * mult) >> shift` without intermediate overflow,
/// saturating the result at `u64::MAX`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn cyc2ns(cycles: u64, mult: u32, shift: u32) -> u64 {
    let wide = (cycles as u128 * mult as u128) >> shift;
    if wide > u64::MAX as u128 {
        u64::MAX
    } else {
        wide as u64
    }
}

/// Derives the conversion factor from `from` Hz to `to` Hz for values
/// spanning up to `max_sec` seconds.
///
/// The multiplier is rounded to nearest. A `max_sec` too large for any
/// shift yields `shift == 0`.
///
/// # Panics
///
/// Panics if `from` is zero.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn calc_mult_shift(from: u32, to: u32, max_sec: u32) -> MultShift {
    assert!(from != 0, "calibrate: zero source frequency");

    // Bits of headroom left in mult once a `max_sec`-long value is multiplied.
    let mut tmp = (max_sec as u64 * from as u64) >> 32;
    let mut sftacc: u32 = 32;
    while tmp != 0 {
        tmp >>= 1;
        sftacc -= 1;
    }

    let mut shift = 32;
    while shift > 0 {
        let mult = (((to as u64) << shift) + from as u64 / 2) / from as u64;
        if mult >> sftacc == 0 {
            return MultShift {
                mult: mult as u32,
                shift,
            };
        }
        shift -= 1;
    }

    MultShift {
        mult: ((to as u64 + from as u64 / 2) / from as u64) as u32,
        shift: 0,
    }
}

/// Clamps a seconds budget to `1..`, and to [`MAX_UPDATE_LENGTH_SECS`] when
/// the device counts beyond 32 bits.
pub(crate) const fn clamp_budget(sec: u64, range: u64) -> u64 {
    if sec == 0 {
        1
    } else if sec > MAX_UPDATE_LENGTH_SECS && range > u32::MAX as u64 {
        MAX_UPDATE_LENGTH_SECS
    } else {
        sec
    }
}

/// Narrows a seconds budget to the `u32` that [`calc_mult_shift`] takes.
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn budget_u32(sec: u64) -> u32 {
    if sec > u32::MAX as u64 {
        u32::MAX
    } else {
        sec as u32
    }
}
