//! Kernel core: the scheduling substrate and every blocking primitive.
//!
//! All kernel state lives in one explicit [`Kernel`] value; every operation
//! takes `&mut Kernel`, either directly or through the typed handles in
//! [`crate::sync`]. There is no ambient global state — a process-wide
//! instance, when one is wanted for interrupt handlers, is installed
//! through [`crate::port`].
//!
//! The kernel is a deterministic scheduling state machine for a single
//! execution core. It decides which task is Running, maintains the ready,
//! delayed and wait lists, and completes blocked operations on a task's
//! behalf when the awaited condition arrives or its deadline elapses.
//! Executing task code is the port layer's concern; the saved execution
//! context is opaque to the core.

pub mod event_groups;
pub mod list;
pub mod notify;
pub mod queue;
pub mod semaphore;
pub mod tasks;
pub mod timers;

use heapless::Deque;

use crate::config::{MAX_EVENT_GROUPS, MAX_PRIORITIES, MAX_QUEUES, MAX_TASKS};
use crate::trace;
use crate::types::{IsrOutcome, RtosError, TaskId, Tick, YieldRequest};

use event_groups::EventGroup;
use list::{Arena, DeadlineList};
use queue::Queue;
use tasks::Tcb;
use timers::TimerService;

/// The kernel context: scheduler tables, object arenas and tick state.
///
/// Create one with [`Kernel::new`], create the initial tasks and objects,
/// then call [`Kernel::start`]. After start exactly one task is Running
/// at any instant and every wake of a higher-priority task preempts the
/// running one synchronously — except inside an ISR bracket, where the
/// switch is deferred to [`Kernel::isr_exit`].
pub struct Kernel {
    pub(crate) tcbs: Arena<Tcb, MAX_TASKS>,
    /// One FIFO per priority level; dispatch scans from the top.
    pub(crate) ready: [Deque<TaskId, MAX_TASKS>; MAX_PRIORITIES],
    /// Blocked tasks with a wake deadline, soonest first.
    pub(crate) delayed: DeadlineList<TaskId, MAX_TASKS>,
    pub(crate) queues: Arena<Queue, MAX_QUEUES>,
    pub(crate) events: Arena<EventGroup, MAX_EVENT_GROUPS>,
    pub(crate) timers: TimerService,
    pub(crate) current: Option<TaskId>,
    pub(crate) tick_count: Tick,
    pub(crate) started: bool,
    pub(crate) in_isr: bool,
    /// Set while the timer daemon body runs; wakes are deferred to the
    /// moment the daemon blocks again, like the ISR bracket.
    pub(crate) in_daemon: bool,
    pub(crate) idle_task: Option<TaskId>,
}

impl Kernel {
    /// A kernel with empty pools, not yet started.
    pub fn new() -> Self {
        const EMPTY: Deque<TaskId, MAX_TASKS> = Deque::new();
        Kernel {
            tcbs: Arena::new(),
            ready: [EMPTY; MAX_PRIORITIES],
            delayed: DeadlineList::new(),
            queues: Arena::new(),
            events: Arena::new(),
            timers: TimerService::new(),
            current: None,
            tick_count: 0,
            started: false,
            in_isr: false,
            in_daemon: false,
            idle_task: None,
        }
    }

    /// Start scheduling: creates the idle task and the timer daemon, then
    /// dispatches the highest-priority ready task.
    ///
    /// Fails with `InvalidOperation` if already started, or
    /// `ResourceExhausted` if the idle task, daemon task or timer command
    /// queue cannot be allocated.
    pub fn start(&mut self) -> Result<(), RtosError> {
        if self.started {
            return Err(RtosError::InvalidOperation);
        }
        let idle = self.create_idle_task()?;
        self.idle_task = Some(idle);
        self.init_timer_service()?;
        self.started = true;
        trace::scheduler_started();
        self.dispatch();
        Ok(())
    }

    /// The task currently Running, once started.
    pub fn current_task(&self) -> Option<TaskId> {
        self.current
    }

    /// Current tick count.
    pub fn now(&self) -> Tick {
        self.tick_count
    }

    /// Whether the scheduler has been started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    // =========================================================================
    // Interrupt entry/exit protocol
    // =========================================================================

    /// Enter interrupt context. Until [`Kernel::isr_exit`], wakes only
    /// request a switch instead of performing one, and blocking is
    /// rejected with `InvalidOperation`.
    pub fn isr_enter(&mut self) {
        self.in_isr = true;
    }

    /// Leave interrupt context, performing at most one context switch if
    /// the folded [`YieldRequest`] asks for it.
    pub fn isr_exit(&mut self, request: YieldRequest) {
        self.in_isr = false;
        if request.is_requested() {
            self.switch_after_isr();
        }
    }

    /// In interrupt context right now?
    pub fn in_isr_context(&self) -> bool {
        self.in_isr
    }

    /// Realize a switch requested during an interrupt. A strictly higher
    /// priority preempts the running task without costing it its turn;
    /// an equal priority rotates it behind its peers (tick time-slicing).
    fn switch_after_isr(&mut self) {
        let best = match self.highest_ready_priority() {
            Some(p) => p,
            None => return,
        };
        match self.running_priority() {
            Some(cur) if best > cur => {
                self.move_current_to_ready(true);
                self.dispatch();
            }
            Some(cur) if best == cur => {
                self.move_current_to_ready(false);
                self.dispatch();
            }
            Some(_) => {}
            None => self.dispatch(),
        }
    }

    /// Run one ISR-safe closure under the full bracket, folding outcomes.
    ///
    /// Convenience for tick sources and simulated handlers:
    /// `kernel.with_isr(|k, y| y.fold(k.tick()?))`.
    pub fn with_isr<E>(
        &mut self,
        f: impl FnOnce(&mut Kernel, &mut YieldRequest) -> Result<(), E>,
    ) -> Result<(), E> {
        self.isr_enter();
        let mut request = YieldRequest::new();
        let result = f(self, &mut request);
        self.isr_exit(request);
        result
    }

    /// Advance the tick counter by `n`, running the full ISR bracket for
    /// each tick. Test and host-port convenience.
    pub fn advance_ticks(&mut self, n: Tick) {
        for _ in 0..n {
            self.isr_enter();
            let mut request = YieldRequest::new();
            if let Ok(outcome) = self.tick() {
                request.fold(outcome);
            }
            self.isr_exit(request);
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::new()
    }
}

// Re-exports of the per-module public surface.
pub use timers::{PendedFunction, TimerCallback};

impl Kernel {
    /// Did a wake outcome ready something above the running task?
    /// Shared helper for the `*_from_isr` return values.
    pub(crate) fn isr_outcome(woke_higher: bool) -> IsrOutcome {
        if woke_higher {
            IsrOutcome::CompletedWokeHigherPriority
        } else {
            IsrOutcome::Completed
        }
    }
}
