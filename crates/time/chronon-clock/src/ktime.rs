//! Nanosecond time values.

/// Absolute or relative time in nanoseconds.
pub type Ktime = i64;

/// Nanoseconds per millisecond.
pub const NSEC_PER_MSEC: i64 = 1_000_000;
/// Nanoseconds per second.
pub const NSEC_PER_SEC: i64 = 1_000_000_000;

/// Seconds plus nanoseconds.
///
/// [`from_ktime`](Self::from_ktime) always yields `nsec` in
/// `0..NSEC_PER_SEC`; negative times carry the sign in `sec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timespec {
    /// Whole seconds.
    pub sec: i64,
    /// Nanoseconds within the second.
    pub nsec: i64,
}

impl Timespec {
    /// Creates a timespec.
    #[must_use]
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Converts to nanoseconds, saturating at the `Ktime` range.
    #[must_use]
    pub const fn to_ktime(self) -> Ktime {
        self.sec.saturating_mul(NSEC_PER_SEC).saturating_add(self.nsec)
    }

    /// Splits nanoseconds into seconds and a normalized remainder.
    #[must_use]
    pub const fn from_ktime(time: Ktime) -> Self {
        Self {
            sec: time.div_euclid(NSEC_PER_SEC),
            nsec: time.rem_euclid(NSEC_PER_SEC),
        }
    }
}

impl From<Timespec> for Ktime {
    fn from(ts: Timespec) -> Self {
        ts.to_ktime()
    }
}

impl From<Ktime> for Timespec {
    fn from(time: Ktime) -> Self {
        Self::from_ktime(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_joins() {
        let ts = Timespec::from_ktime(3 * NSEC_PER_SEC + 250 * NSEC_PER_MSEC);
        assert_eq!(ts, Timespec::new(3, 250_000_000));
        assert_eq!(ts.to_ktime(), 3_250_000_000);
    }

    #[test]
    fn negative_time_normalizes_nanoseconds() {
        let ts = Timespec::from_ktime(-1);
        assert_eq!(ts, Timespec::new(-1, NSEC_PER_SEC - 1));
        assert_eq!(Ktime::from(ts), -1);
    }

    #[test]
    fn unnormalized_input_still_converts() {
        assert_eq!(Timespec::new(1, 1_500_000_000).to_ktime(), 2_500_000_000);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        assert_eq!(Timespec::new(i64::MAX, 0).to_ktime(), i64::MAX);
        assert_eq!(Timespec::new(i64::MIN, 0).to_ktime(), i64::MIN);
    }
}
