//! Timer records and the types that describe them.

use core::fmt;

use chronon_clock::Ktime;
use chronon_rbtree::{NodeId, RbLink};

use crate::queue::TimerContext;

/// Handle of a timer slot in a [`TimerQueue`](crate::TimerQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TimerId(NodeId);

impl TimerId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(NodeId::new(index))
    }

    pub(crate) const fn from_node(node: NodeId) -> Self {
        Self(node)
    }

    pub(crate) const fn node(self) -> NodeId {
        self.0
    }

    /// Slot index inside the queue's pool.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer{}", self.index())
    }
}

/// How the `time` argument of `init`/`start` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HrTimerMode {
    /// `time` is an absolute deadline on the clocksource timeline.
    #[default]
    Absolute,
    /// `time` is a delay from now.
    Relative,
}

/// What a callback asks the queue to do with its timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum HrTimerRestart {
    /// Leave the timer inactive.
    NoRestart,
    /// Re-enqueue at its current deadline (advance it first, usually with
    /// [`TimerContext::forward_now`]).
    Restart,
}

bitflags::bitflags! {
    /// Timer state bits. Both may be set at once: a callback that re-arms
    /// its own timer is queued while still running.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TimerState: u8 {
        /// Linked into the queue's ordered index.
        const ENQUEUED = 1 << 0;
        /// Callback is executing.
        const CALLBACK = 1 << 1;
    }
}

impl TimerState {
    /// Neither queued nor running.
    pub const INACTIVE: Self = Self::empty();

    /// Linked into the queue.
    #[must_use]
    pub const fn is_queued(self) -> bool {
        self.contains(Self::ENQUEUED)
    }

    /// Callback currently executing.
    #[must_use]
    pub const fn is_callback_running(self) -> bool {
        self.contains(Self::CALLBACK)
    }

    /// Queued or running.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_empty()
    }
}

/// Timer callback.
///
/// Runs from the clockevent interrupt with interrupts masked; it must not
/// block. The second argument is the opaque value given to `init`.
pub type TimerFn<const N: usize> = fn(&mut TimerContext<'_, '_, N>, usize) -> HrTimerRestart;

/// One slot of the timer pool.
#[derive(Clone, Copy)]
pub(crate) struct HrTimer<const N: usize> {
    pub(crate) link: RbLink,
    pub(crate) deadline: Ktime,
    pub(crate) state: TimerState,
    pub(crate) mode: HrTimerMode,
    pub(crate) callback: Option<TimerFn<N>>,
    pub(crate) arg: usize,
    pub(crate) claimed: bool,
    /// Interrupt pass in which `pass_fires` was last counted.
    pub(crate) pass: u32,
    pub(crate) pass_fires: u32,
    /// Set once the timer hit the re-fire bound in `pass`.
    pub(crate) deferred: bool,
}

impl<const N: usize> HrTimer<N> {
    pub(crate) const EMPTY: Self = Self {
        link: RbLink::UNLINKED,
        deadline: 0,
        state: TimerState::INACTIVE,
        mode: HrTimerMode::Absolute,
        callback: None,
        arg: 0,
        claimed: false,
        pass: 0,
        pass_fires: 0,
        deferred: false,
    };
}

impl<const N: usize> fmt::Debug for HrTimer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HrTimer")
            .field("deadline", &self.deadline)
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("claimed", &self.claimed)
            .finish_non_exhaustive()
    }
}
