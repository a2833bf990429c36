//! Base types shared by every kernel module.
//!
//! Handles are small copyable ids into the kernel's arenas; they carry no
//! lifetime and stay valid until the object they name is deleted. Using a
//! handle after deletion reports [`RtosError::InvalidHandle`].

use core::fmt;

use crate::config::MAX_ITEM_SIZE;

/// Kernel time unit, counted by the external tick source. 64 bits wide so
/// no overflow epoch handling is needed.
pub type Tick = u64;

/// Raw bytes of one queue item, as stored in a queue's ring.
pub type RawItem = heapless::Vec<u8, MAX_ITEM_SIZE>;

/// Event group bit field. Only the low 24 bits are usable; the rest are
/// reserved and rejected in masks.
pub type EventBits = u32;

// =============================================================================
// Timeouts
// =============================================================================

/// How long a blocking operation may wait.
///
/// `None` (and `Ticks(0)`) means "try once, never block"; the operation
/// reports `Full`/`Empty` instead of `TimedOut` on that path. `Forever`
/// is supported but converts design bugs into silent hangs; prefer a
/// bounded wait and branch on `TimedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Do not block.
    None,
    /// Block for at most this many ticks.
    Ticks(Tick),
    /// Block until the awaited condition holds.
    Forever,
}

impl Timeout {
    /// True for the try-once forms (`None` and `Ticks(0)`).
    pub fn is_immediate(&self) -> bool {
        matches!(self, Timeout::None | Timeout::Ticks(0))
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Handle to a task control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(pub(crate) usize);

/// Handle to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueId(pub(crate) usize);

/// Handle to a counting or binary semaphore.
///
/// Semaphores are queues of item size zero; the wrapper type keeps the
/// two APIs from being mixed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreId(pub(crate) QueueId);

/// Handle to a mutex (priority-inheriting, optionally recursive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexId(pub(crate) QueueId);

/// Handle to an event group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventGroupId(pub(crate) usize);

/// Handle to a software timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(pub(crate) usize);

// =============================================================================
// Errors
// =============================================================================

/// Error conditions reported by kernel operations.
///
/// `TimedOut` is not a failure in the usual sense: it is the expected
/// outcome of a bounded wait that did not complete, and callers must
/// branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtosError {
    /// A fixed-size pool (tasks, queues, timers, ...) is empty.
    ResourceExhausted,
    /// A bounded wait elapsed before the condition held.
    TimedOut,
    /// Try-once send on a full queue, or give on a semaphore at its
    /// maximum count.
    Full,
    /// Try-once receive/take on an empty queue or semaphore.
    Empty,
    /// `SetValueWithoutOverwrite` on a notification slot that already
    /// holds an unconsumed value.
    AlreadyPending,
    /// The handle does not name a live object.
    InvalidHandle,
    /// A parameter is out of range (zero-length queue, reserved event
    /// bits, period of zero, ...).
    InvalidArgument,
    /// The operation is not legal in the current context, e.g. blocking
    /// from interrupt context or taking a mutex from an ISR.
    InvalidOperation,
    /// A mutex give by a task that does not hold the mutex.
    NotHolder,
}

impl fmt::Display for RtosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RtosError::ResourceExhausted => "resource pool exhausted",
            RtosError::TimedOut => "timed out",
            RtosError::Full => "full",
            RtosError::Empty => "empty",
            RtosError::AlreadyPending => "notification already pending",
            RtosError::InvalidHandle => "invalid handle",
            RtosError::InvalidArgument => "invalid argument",
            RtosError::InvalidOperation => "invalid operation",
            RtosError::NotHolder => "caller does not hold the mutex",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Task states
// =============================================================================

/// Scheduler state of one task. Exactly one task is `Running` at any
/// instant once the kernel has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Blocked,
    Suspended,
    Terminated,
}

// =============================================================================
// Operation outcomes
// =============================================================================

/// Outcome of a send that was allowed to block.
///
/// `Blocked` means the calling task has been switched out; the final
/// result arrives through its wake-result slot when it next runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SendOutcome {
    Sent,
    Blocked,
}

/// Outcome of a receive that was allowed to block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum ReceiveOutcome {
    Received(RawItem),
    Blocked,
}

/// Outcome of a semaphore or mutex take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TakeOutcome {
    Taken,
    Blocked,
}

/// Outcome of an event group wait.
///
/// `Unmatched` is only produced by the try-once form and carries the bit
/// field at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum EventWaitOutcome {
    Matched(EventBits),
    Unmatched(EventBits),
    Blocked,
}

/// Outcome of a notification wait or take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum NotifyWaitOutcome {
    Notified(u32),
    Blocked,
}

/// Result of a blocked operation, delivered through the task's
/// wake-result slot when the task is made Ready again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeResult {
    /// `delay_for`/`delay_until` completed.
    DelayElapsed,
    /// A blocked send completed.
    Sent,
    /// A blocked receive completed with this item.
    Received(RawItem),
    /// A blocked semaphore/mutex take completed.
    Taken,
    /// A blocked event wait was satisfied; this is the bit field that
    /// satisfied it, before any clear-on-exit masks were applied.
    EventBitsMatched(EventBits),
    /// A blocked notification wait completed with this value.
    Notified(u32),
    /// The wait deadline elapsed. Event waits carry the bit field
    /// observed at expiry.
    TimedOut(Option<EventBits>),
}

// =============================================================================
// ISR handoff protocol
// =============================================================================

/// Result of an ISR-safe operation that completed.
///
/// The would-block paths are reported as [`RtosError::Full`] /
/// [`RtosError::Empty`] instead; ISR-safe operations never block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum IsrOutcome {
    /// The operation completed without readying a task of higher
    /// priority than the one that was interrupted.
    Completed,
    /// The operation readied a task of higher priority; the handler
    /// must request a reschedule at interrupt exit.
    CompletedWokeHigherPriority,
}

/// Accumulator for [`IsrOutcome`]s across one interrupt handler.
///
/// Fold every outcome produced inside the handler, then hand the
/// accumulator to [`Kernel::isr_exit`](crate::kernel::Kernel::isr_exit),
/// which performs at most one reschedule.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldRequest(bool);

impl YieldRequest {
    pub const fn new() -> Self {
        YieldRequest(false)
    }

    /// Record one operation's outcome.
    pub fn fold(&mut self, outcome: IsrOutcome) {
        if outcome == IsrOutcome::CompletedWokeHigherPriority {
            self.0 = true;
        }
    }

    /// True once any folded outcome woke a higher-priority task.
    pub fn is_requested(&self) -> bool {
        self.0
    }
}

// =============================================================================
// Callback kinds
// =============================================================================

/// A task entry routine: runs forever with its creation argument.
/// Returning from a task body is a fatal condition, hence the `!`.
pub type TaskFn = fn(usize) -> !;

/// Reload behavior of a software timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Fire once, then go dormant.
    OneShot,
    /// Re-arm at `now + period` after each expiry.
    AutoReload,
}

/// How a notification mutates the target slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyAction {
    /// Set the slot Pending without touching the value.
    NoAction,
    /// OR the notified value into the slot.
    SetBits,
    /// Increment the slot value (lightweight counting semaphore).
    Increment,
    /// Replace the slot value unconditionally.
    SetValueWithOverwrite,
    /// Replace the slot value only if no unconsumed value is pending;
    /// otherwise report `AlreadyPending` and change nothing.
    SetValueWithoutOverwrite,
}
