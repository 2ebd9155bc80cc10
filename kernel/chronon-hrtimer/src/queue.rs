//! The deadline-ordered timer queue.
//!
//! [`TimerQueue`] owns a fixed pool of `N` timer slots, an intrusive
//! red-black tree over the slots ordered by deadline, and the registered
//! clocksource and clockevent. It is not synchronized; [`HrTimers`] wraps it
//! in an [`IrqLock`](chronon_core::sync::IrqLock) so task code and the
//! clockevent interrupt can share it.
//!
//! Slot 0 is reserved for the keep-alive timer. Whenever the queue runs
//! empty the keep-alive is armed `max_idle_ns` ahead, which guarantees that
//! the clocksource accumulator is sampled often enough to survive counter
//! wrap-around.
//!
//! [`HrTimers`]: crate::HrTimers

use core::fmt;
use core::ops::{Index, IndexMut};

use chronon_clock::calibrate::MIN_DELTA_FLOOR_NS;
use chronon_clock::{Clockevent, ClockeventDevice, Clocksource, ClocksourceDevice, Ktime};
use chronon_core::{kdebug, kinfo, ktrace, kwarn};
use chronon_rbtree::{NodeId, RbArena, RbKeyed, RbLink, RbRoot};

use crate::config;
use crate::timer::{HrTimer, HrTimerMode, HrTimerRestart, TimerFn, TimerId, TimerState};

/// Slot of the keep-alive timer.
const KEEPALIVE: TimerId = TimerId::new(0);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How [`TimerQueue::forward`] resynchronizes a timer that fell at least one
/// whole interval behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resync {
    /// Drop the backlog: the next deadline becomes `now` plus the
    /// clockevent's minimum delay, and the overrun counts every missed
    /// period plus the one being started.
    #[default]
    EventMinDelta,
    /// Stay on the original period grid: the deadline moves to the last
    /// grid point not after `now`, so the timer fires once more right away
    /// and is back in phase afterwards.
    Grid,
}

/// Tunables of a [`TimerQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Fires beyond the first that one timer may take within a single
    /// interrupt pass. The remaining backlog of that timer waits for the
    /// next interrupt; other expired timers still run.
    pub max_refires_per_pass: u32,
    /// Catch-up policy of [`TimerQueue::forward`].
    pub resync: Resync,
}

impl QueueConfig {
    /// Build-time defaults from [`config`](crate::config).
    pub const DEFAULT: Self = Self {
        max_refires_per_pass: config::MAX_REFIRES_PER_PASS,
        resync: Resync::EventMinDelta,
    };
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Start results
// ---------------------------------------------------------------------------

/// Why [`TimerQueue::start`] refused a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// The requested mode differs from the one given to `init`.
    ModeMismatch,
    /// An absolute deadline that is not after the current time.
    DeadlineInPast,
}

impl StartError {
    /// Raw status code for C-style callers.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        -1
    }
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModeMismatch => f.write_str("timer mode differs from the initialized mode"),
            Self::DeadlineInPast => f.write_str("absolute deadline is not in the future"),
        }
    }
}

impl core::error::Error for StartError {}

/// What [`TimerQueue::start`] found before queueing the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    /// The timer was not queued.
    Inactive,
    /// The timer was queued and has been moved to the new deadline.
    WasActive,
}

impl StartStatus {
    /// Raw status code for C-style callers.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Inactive => 0,
            Self::WasActive => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Slot storage
// ---------------------------------------------------------------------------

struct Slots<const N: usize>([HrTimer<N>; N]);

impl<const N: usize> Index<TimerId> for Slots<N> {
    type Output = HrTimer<N>;

    fn index(&self, id: TimerId) -> &HrTimer<N> {
        &self.0[id.index()]
    }
}

impl<const N: usize> IndexMut<TimerId> for Slots<N> {
    fn index_mut(&mut self, id: TimerId) -> &mut HrTimer<N> {
        &mut self.0[id.index()]
    }
}

impl<const N: usize> RbArena for Slots<N> {
    fn link(&self, id: NodeId) -> &RbLink {
        &self.0[id.index()].link
    }

    fn link_mut(&mut self, id: NodeId) -> &mut RbLink {
        &mut self.0[id.index()].link
    }
}

impl<const N: usize> RbKeyed for Slots<N> {
    type Key = Ktime;

    fn key(&self, id: NodeId) -> Ktime {
        self.0[id.index()].deadline
    }
}

// ---------------------------------------------------------------------------
// TimerQueue
// ---------------------------------------------------------------------------

/// Deadline-ordered queue of up to `N - 1` user timers.
pub struct TimerQueue<'d, const N: usize> {
    root: RbRoot,
    /// Earliest queued timer.
    next: Option<TimerId>,
    slots: Slots<N>,
    source: Option<Clocksource<'d>>,
    event: Option<Clockevent<'d>>,
    config: QueueConfig,
    /// Interrupt pass counter for the re-fire bound.
    pass: u32,
}

impl<'d, const N: usize> TimerQueue<'d, N> {
    /// Creates an empty queue with the build-time configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_config(QueueConfig::DEFAULT)
    }

    /// Creates an empty queue with explicit tunables.
    #[must_use]
    pub const fn with_config(config: QueueConfig) -> Self {
        const {
            assert!(N >= 2, "timer queue needs a keep-alive slot and at least one user slot");
        }
        Self {
            root: RbRoot::new(),
            next: None,
            slots: Slots([HrTimer::EMPTY; N]),
            source: None,
            event: None,
            config,
            pass: 0,
        }
    }

    /// The queue's tunables.
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    // -- Devices -----------------------------------------------------------

    /// Registers the clocksource, counting at `hz`.
    ///
    /// Replacing an earlier clocksource continues its timeline, so
    /// [`absolute_time`](Self::absolute_time) never goes backwards.
    ///
    /// # Panics
    ///
    /// Panics if `hz` is zero.
    pub fn register_clocksource(&mut self, device: &'d dyn ClocksourceDevice, hz: u32) {
        self.install_clocksource(device, hz, 1);
    }

    /// Registers the clocksource, counting at `khz` kilohertz.
    ///
    /// # Panics
    ///
    /// Panics if `khz` is zero.
    pub fn register_clocksource_khz(&mut self, device: &'d dyn ClocksourceDevice, khz: u32) {
        self.install_clocksource(device, khz, 1000);
    }

    fn install_clocksource(&mut self, device: &'d dyn ClocksourceDevice, freq: u32, scale: u32) {
        let base = self.absolute_time();
        let source = Clocksource::new(device, freq, scale, base);
        let cal = source.calibration();
        kinfo!(
            "clocksource: mask: {:#x} max_cycles: {:#x}, max_idle_ns: {} ns",
            cal.mask,
            cal.max_cycles,
            cal.max_idle_ns
        );
        self.source = Some(source);
    }

    /// Registers the clockevent device, running at `hz`.
    ///
    /// If timers are already queued the new device is armed for the
    /// earliest one.
    ///
    /// # Panics
    ///
    /// Panics if `hz` is zero.
    pub fn register_clockevent(&mut self, device: &'d dyn ClockeventDevice, hz: u32) {
        let event = Clockevent::new(device, hz);
        let cal = event.calibration();
        kinfo!(
            "clockevent: {} Hz, min_delta_ns: {} max_delta_ns: {}",
            hz,
            cal.min_delta_ns,
            cal.max_delta_ns
        );
        self.event = Some(event);
        if self.next.is_some() {
            self.reschedule();
        }
    }

    /// The registered clocksource.
    #[must_use]
    pub fn clocksource(&self) -> Option<&Clocksource<'d>> {
        self.source.as_ref()
    }

    /// The registered clockevent device.
    #[must_use]
    pub fn clockevent(&self) -> Option<&Clockevent<'d>> {
        self.event.as_ref()
    }

    /// Current time in nanoseconds, `0` until a clocksource is registered.
    pub fn absolute_time(&mut self) -> Ktime {
        self.source.as_mut().map_or(0, Clocksource::absolute_time)
    }

    // -- Pool --------------------------------------------------------------

    /// Takes a free timer slot, or `None` if all `N - 1` are in use.
    pub fn claim(&mut self) -> Option<TimerId> {
        let Some(index) = (1..N).find(|&index| !self.slots.0[index].claimed) else {
            kdebug!("hrtimer: all {} timers in use", N - 1);
            return None;
        };
        self.slots.0[index] = HrTimer {
            claimed: true,
            ..HrTimer::EMPTY
        };
        Some(TimerId::new(index))
    }

    /// Cancels the timer and returns its slot to the pool.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not claimed.
    pub fn release(&mut self, id: TimerId) {
        self.cancel(id);
        self.slots[id] = HrTimer::EMPTY;
    }

    #[track_caller]
    fn assert_claimed(&self, id: TimerId) {
        assert!(
            id != KEEPALIVE && self.slots[id].claimed,
            "hrtimer: {id} is not claimed"
        );
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Binds `callback` and `arg` to the timer and sets its mode and a
    /// provisional deadline. A queued timer is cancelled first.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not claimed.
    pub fn init(
        &mut self,
        id: TimerId,
        callback: TimerFn<N>,
        arg: usize,
        time: Ktime,
        mode: HrTimerMode,
    ) {
        self.assert_claimed(id);
        if self.slots[id].state.is_queued() {
            self.cancel(id);
        }
        let now = self.absolute_time();
        self.reset(id, Some(callback), arg, time, mode, now);
    }

    fn reset(
        &mut self,
        id: TimerId,
        callback: Option<TimerFn<N>>,
        arg: usize,
        time: Ktime,
        mode: HrTimerMode,
        now: Ktime,
    ) {
        let slot = &mut self.slots[id];
        *slot = HrTimer {
            claimed: slot.claimed,
            callback,
            arg,
            mode,
            deadline: resolve(time, mode, now),
            ..HrTimer::EMPTY
        };
    }

    /// Queues the timer at `time`, moving it if it was already queued.
    ///
    /// # Errors
    ///
    /// [`StartError::ModeMismatch`] if `mode` is not the mode given to
    /// `init`, [`StartError::DeadlineInPast`] for an absolute `time` at or
    /// before now. The timer is left untouched in both cases.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not claimed.
    pub fn start(
        &mut self,
        id: TimerId,
        time: Ktime,
        mode: HrTimerMode,
    ) -> Result<StartStatus, StartError> {
        self.assert_claimed(id);
        let now = self.absolute_time();
        let rejected = if self.slots[id].mode != mode {
            Some(StartError::ModeMismatch)
        } else if mode == HrTimerMode::Absolute && time <= now {
            Some(StartError::DeadlineInPast)
        } else {
            None
        };
        if let Some(err) = rejected {
            kdebug!("hrtimer: {} not started: {}", id, err);
            return Err(err);
        }

        let status = if self.slots[id].state.is_queued() {
            self.dequeue(id);
            StartStatus::WasActive
        } else {
            StartStatus::Inactive
        };
        self.slots[id].deadline = resolve(time, mode, now);
        self.enqueue(id);
        if self.next == Some(id) {
            self.reschedule();
        }
        Ok(status)
    }

    /// Removes the timer from the queue. Returns `false` if it was not
    /// queued.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not claimed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.assert_claimed(id);
        if !self.slots[id].state.is_queued() {
            return false;
        }
        let was_next = self.next == Some(id);
        self.dequeue(id);
        if was_next {
            self.reschedule();
        }
        true
    }

    /// Advances the deadline of a periodic timer by whole `interval`s
    /// relative to `now` and returns the overrun count.
    ///
    /// Returns `0` without touching the timer if its deadline is still
    /// after `now` or `interval` is not positive. A timer that fell at
    /// least one interval behind is resynchronized according to
    /// [`QueueConfig::resync`]; otherwise the deadline moves by exactly one
    /// interval and the overrun is `1`. A queued timer is re-sorted.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not claimed.
    pub fn forward(&mut self, id: TimerId, now: Ktime, interval: Ktime) -> u64 {
        self.assert_claimed(id);
        let deadline = self.slots[id].deadline;
        let delta = now.saturating_sub(deadline);
        if delta < 0 || interval <= 0 {
            return 0;
        }

        let (deadline, overrun) = if delta >= interval {
            let (behind, step) = (delta.unsigned_abs(), interval.unsigned_abs());
            match self.config.resync {
                Resync::EventMinDelta => {
                    let slack = self
                        .event
                        .as_ref()
                        .map_or(MIN_DELTA_FLOOR_NS, Clockevent::min_delta_ns);
                    (
                        now.saturating_add(Ktime::try_from(slack).unwrap_or(Ktime::MAX)),
                        1 + behind.div_ceil(step),
                    )
                }
                Resync::Grid => {
                    let periods = behind / step;
                    let skip = Ktime::try_from(periods * step).unwrap_or(Ktime::MAX);
                    (deadline.saturating_add(skip), periods + 1)
                }
            }
        } else {
            (deadline.saturating_add(interval), 1)
        };

        self.move_deadline(id, deadline);
        overrun
    }

    /// [`forward`](Self::forward) relative to the current time.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not claimed.
    pub fn forward_now(&mut self, id: TimerId, interval: Ktime) -> u64 {
        let now = self.absolute_time();
        self.forward(id, now, interval)
    }

    fn move_deadline(&mut self, id: TimerId, deadline: Ktime) {
        if !self.slots[id].state.is_queued() {
            self.slots[id].deadline = deadline;
            return;
        }
        let was_next = self.next == Some(id);
        self.dequeue(id);
        self.slots[id].deadline = deadline;
        self.enqueue(id);
        if was_next || self.next == Some(id) {
            self.reschedule();
        }
    }

    // -- Queries -----------------------------------------------------------

    /// State bits of the timer.
    #[must_use]
    pub fn state(&self, id: TimerId) -> TimerState {
        self.slots[id].state
    }

    /// Deadline of the timer, meaningful once it has been initialized.
    #[must_use]
    pub fn deadline(&self, id: TimerId) -> Ktime {
        self.slots[id].deadline
    }

    /// Mode given to `init`.
    #[must_use]
    pub fn mode(&self, id: TimerId) -> HrTimerMode {
        self.slots[id].mode
    }

    /// Whether the timer is queued.
    #[must_use]
    pub fn is_queued(&self, id: TimerId) -> bool {
        self.slots[id].state.is_queued()
    }

    /// The earliest queued timer, including the keep-alive.
    #[must_use]
    pub const fn next_timer(&self) -> Option<TimerId> {
        self.next
    }

    /// Deadline of the earliest queued timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Ktime> {
        self.next.map(|id| self.slots[id].deadline)
    }

    /// Number of queued timers, including the keep-alive.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.root.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Queued timers in firing order.
    pub fn iter_queued(&self) -> impl Iterator<Item = TimerId> + '_ {
        self.root.iter(&self.slots).map(TimerId::from_node)
    }

    // -- Interrupt path ----------------------------------------------------

    /// Clockevent interrupt entry: runs every expired timer, then re-arms
    /// the device.
    pub fn handle_interrupt(&mut self) {
        self.invoke();
        self.reschedule();
    }

    /// Runs expired timers in deadline order.
    ///
    /// The clock is re-sampled before every timer, so timers that expire
    /// while callbacks run are picked up in the same pass. A timer that used
    /// up its re-fires stays queued for the next interrupt while the other
    /// expired timers keep running.
    pub fn invoke(&mut self) {
        self.pass = self.pass.wrapping_add(1);
        loop {
            let now = self.absolute_time();
            let Some(id) = self.next_due(now) else { break };
            let timer = &mut self.slots[id];
            timer.pass_fires = timer.pass_fires.saturating_add(1);

            self.dequeue(id);
            let restart = self.run_callback(id);
            let timer = &self.slots[id];
            if restart == HrTimerRestart::Restart && timer.claimed && !timer.state.is_queued() {
                self.enqueue(id);
            }
        }
    }

    /// Earliest expired timer that may still fire in this pass.
    fn next_due(&mut self, now: Ktime) -> Option<TimerId> {
        let mut cursor = self.next;
        while let Some(id) = cursor {
            if self.slots[id].deadline > now {
                return None;
            }
            if self.fires_left(id) {
                return Some(id);
            }
            cursor = RbRoot::next(&self.slots, id.node()).map(TimerId::from_node);
        }
        None
    }

    fn fires_left(&mut self, id: TimerId) -> bool {
        let (pass, limit) = (self.pass, self.config.max_refires_per_pass);
        let timer = &mut self.slots[id];
        if timer.pass != pass {
            timer.pass = pass;
            timer.pass_fires = 0;
            timer.deferred = false;
        }
        if timer.pass_fires <= limit {
            return true;
        }
        if !timer.deferred {
            timer.deferred = true;
            kwarn!(
                "hrtimer: {} still expired after {} re-fires, deferring to next interrupt",
                id,
                limit
            );
        }
        false
    }

    fn run_callback(&mut self, id: TimerId) -> HrTimerRestart {
        let Some(callback) = self.slots[id].callback else {
            return HrTimerRestart::NoRestart;
        };
        let arg = self.slots[id].arg;
        self.slots[id].state.insert(TimerState::CALLBACK);
        let restart = callback(&mut TimerContext { queue: &mut *self, id }, arg);
        self.slots[id].state.remove(TimerState::CALLBACK);
        restart
    }

    /// Arms the clockevent for the earliest timer, arming the keep-alive
    /// first if nothing is queued.
    ///
    /// The delay never exceeds the clocksource's `max_idle_ns`, so a far
    /// deadline still gets an interrupt before the counter can wrap past
    /// the last sample.
    pub fn reschedule(&mut self) {
        if self.next.is_none() {
            self.arm_keepalive();
        }
        let Some(next) = self.next else { return };
        let now = self.absolute_time();
        let mut delta = self.slots[next].deadline.saturating_sub(now);
        if let Some(idle) = self.max_idle() {
            delta = delta.min(idle);
        }
        if let Some(event) = &self.event {
            let cycles = event.program(delta);
            ktrace!("hrtimer: next event in {} ns ({} cycles)", delta, cycles);
        }
    }

    fn max_idle(&self) -> Option<Ktime> {
        let idle = self.source.as_ref()?.calibration().max_idle_ns;
        Some(Ktime::try_from(idle).unwrap_or(Ktime::MAX))
    }

    fn arm_keepalive(&mut self) {
        let Some(idle) = self.max_idle() else { return };
        let now = self.absolute_time();
        self.reset(KEEPALIVE, None, 0, idle, HrTimerMode::Relative, now);
        self.enqueue(KEEPALIVE);
        ktrace!("hrtimer: queue idle, keep-alive in {} ns", idle);
    }

    // -- Ordered index -----------------------------------------------------

    fn enqueue(&mut self, id: TimerId) {
        self.root.insert(&mut self.slots, id.node());
        self.slots[id].state.insert(TimerState::ENQUEUED);
        let deadline = self.slots[id].deadline;
        // Equal deadlines sort after the cached timer, so only a strictly
        // earlier one takes its place.
        if self
            .next
            .is_none_or(|next| deadline < self.slots[next].deadline)
        {
            self.next = Some(id);
        }
    }

    fn dequeue(&mut self, id: TimerId) {
        if self.next == Some(id) {
            self.next = RbRoot::next(&self.slots, id.node()).map(TimerId::from_node);
        }
        self.root.erase(&mut self.slots, id.node());
        self.slots[id].state.remove(TimerState::ENQUEUED);
    }
}

impl<const N: usize> Default for TimerQueue<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for TimerQueue<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("queued", &self.root.len())
            .field("next", &self.next)
            .field("source", &self.source)
            .field("event", &self.event)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn resolve(time: Ktime, mode: HrTimerMode, now: Ktime) -> Ktime {
    match mode {
        HrTimerMode::Absolute => time,
        HrTimerMode::Relative => now.saturating_add(time),
    }
}

// ---------------------------------------------------------------------------
// Callback context
// ---------------------------------------------------------------------------

/// Access to the queue from inside a timer callback.
///
/// The queue is already locked while callbacks run; everything a callback
/// needs goes through this context instead of the
/// [`HrTimers`](crate::HrTimers) facade.
pub struct TimerContext<'q, 'd, const N: usize> {
    queue: &'q mut TimerQueue<'d, N>,
    id: TimerId,
}

impl<'d, const N: usize> TimerContext<'_, 'd, N> {
    /// The firing timer.
    #[must_use]
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Deadline the timer fired for.
    #[must_use]
    pub fn deadline(&self) -> Ktime {
        self.queue.deadline(self.id)
    }

    /// Current time.
    pub fn now(&mut self) -> Ktime {
        self.queue.absolute_time()
    }

    /// [`TimerQueue::forward`] on the firing timer.
    pub fn forward(&mut self, now: Ktime, interval: Ktime) -> u64 {
        self.queue.forward(self.id, now, interval)
    }

    /// [`TimerQueue::forward_now`] on the firing timer.
    pub fn forward_now(&mut self, interval: Ktime) -> u64 {
        self.queue.forward_now(self.id, interval)
    }

    /// The whole queue, e.g. to start or cancel other timers.
    pub fn queue(&mut self) -> &mut TimerQueue<'d, N> {
        self.queue
    }
}
