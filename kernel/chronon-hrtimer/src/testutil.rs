//! Simulated timer hardware for the unit tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chronon_clock::{ClockeventDevice, ClocksourceDevice};

/// Frequency of the simulated counter and compare unit.
pub(crate) const SIM_HZ: u32 = 24_000_000;

/// Cycles of the simulated 24 MHz counter per millisecond.
pub(crate) const CYCLES_PER_MS: u64 = 24_000;

/// Free-running 32-bit up-counter that only moves when told to.
pub(crate) struct SimCounter {
    value: AtomicU64,
}

impl SimCounter {
    pub(crate) const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub(crate) fn advance(&self, cycles: u64) {
        self.value.fetch_add(cycles, Ordering::SeqCst);
    }

    pub(crate) fn advance_ms(&self, ms: u64) {
        self.advance(ms * CYCLES_PER_MS);
    }
}

impl ClocksourceDevice for SimCounter {
    fn read(&self) -> u64 {
        self.value.load(Ordering::SeqCst) & 0xFFFF_FFFF
    }

    fn mask(&self) -> u64 {
        0xFFFF_FFFF
    }
}

/// Compare unit that records what it was armed with.
pub(crate) struct SimAlarm {
    armed: AtomicU64,
    programs: AtomicU64,
}

impl SimAlarm {
    pub(crate) const fn new() -> Self {
        Self {
            armed: AtomicU64::new(0),
            programs: AtomicU64::new(0),
        }
    }

    /// Cycle count of the most recent `set_next_event`.
    pub(crate) fn armed(&self) -> u64 {
        self.armed.load(Ordering::SeqCst)
    }

    /// Number of `set_next_event` calls so far.
    pub(crate) fn programs(&self) -> u64 {
        self.programs.load(Ordering::SeqCst)
    }
}

impl ClockeventDevice for SimAlarm {
    fn set_next_event(&self, cycles: u64) {
        self.armed.store(cycles, Ordering::SeqCst);
        self.programs.fetch_add(1, Ordering::SeqCst);
    }

    fn min_delta_cycles(&self) -> u64 {
        1
    }

    fn max_delta_cycles(&self) -> u64 {
        0xFFFF_FFFE
    }
}
