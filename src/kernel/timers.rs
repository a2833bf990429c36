//! Software timers and the timer daemon task.
//!
//! Timer callbacks never run in interrupt context: every command
//! (start, stop, change-period, delete, pended call) is serialized
//! through a queue to the daemon task, which also fires expired timers
//! and re-arms auto-reload ones. The daemon runs at
//! [`TIMER_TASK_PRIORITY`], so commands are processed promptly; its body
//! is kernel code executed whenever the daemon is dispatched, ending
//! when it blocks on the command queue again.
//!
//! The command queue doubles as the deferred-interrupt funnel:
//! [`Kernel::pend_function_call_from_isr`] hands a tagged closure to the
//! daemon, which is how handlers run non-ISR-safe work (the second
//! deferral strategy next to a dedicated worker task woken by a
//! semaphore).

use heapless::String;

use crate::config::{MAX_NAME_LEN, MAX_TIMERS, TIMER_QUEUE_DEPTH, TIMER_TASK_PRIORITY};
use crate::trace;
use crate::types::{
    IsrOutcome, QueueId, RawItem, ReceiveOutcome, RtosError, SendOutcome, TaskId, Tick, TimerId,
    TimerMode, Timeout, WakeResult,
};

use super::list::{Arena, DeadlineList};
use super::queue::QueueKind;
use super::tasks::TaskEntry;
use super::Kernel;

/// A timer expiry callback. Runs in the daemon task's context with full
/// kernel access; it must not block.
pub type TimerCallback = fn(&mut Kernel, TimerId);

/// A function pended from an ISR, executed later by the daemon with the
/// two context words given at pend time.
pub type PendedFunction = fn(&mut Kernel, usize, u32);

pub(crate) struct Timer {
    pub name: String<MAX_NAME_LEN>,
    pub period: Tick,
    pub mode: TimerMode,
    /// Caller-owned context word, readable from the callback.
    pub payload: u32,
    pub callback: TimerCallback,
    /// Armed (counting toward an expiry) or dormant.
    pub active: bool,
}

pub(crate) struct TimerService {
    pub pool: Arena<Timer, MAX_TIMERS>,
    /// Armed timers, soonest expiry first.
    pub active: DeadlineList<TimerId, MAX_TIMERS>,
    pub cmd_queue: Option<QueueId>,
    pub daemon: Option<TaskId>,
}

impl TimerService {
    pub(crate) fn new() -> Self {
        TimerService {
            pool: Arena::new(),
            active: DeadlineList::new(),
            cmd_queue: None,
            daemon: None,
        }
    }
}

// =============================================================================
// Command wire format
// =============================================================================

// Commands travel through a real kernel queue, so they are serialized by
// hand: a tag byte plus three little-endian u64 words. Function pointers
// round-trip through usize.
const CMD_ITEM_SIZE: usize = 1 + 3 * 8;

const TAG_START: u8 = 0;
const TAG_STOP: u8 = 1;
const TAG_CHANGE_PERIOD: u8 = 2;
const TAG_DELETE: u8 = 3;
const TAG_PEND_CALL: u8 = 4;

#[derive(Clone, Copy)]
enum TimerCommand {
    Start(TimerId),
    Stop(TimerId),
    ChangePeriod(TimerId, Tick),
    Delete(TimerId),
    PendCall(PendedFunction, usize, u32),
}

impl TimerCommand {
    fn encode(self) -> RawItem {
        let (tag, a, b, c) = match self {
            TimerCommand::Start(t) => (TAG_START, t.0 as u64, 0, 0),
            TimerCommand::Stop(t) => (TAG_STOP, t.0 as u64, 0, 0),
            TimerCommand::ChangePeriod(t, p) => (TAG_CHANGE_PERIOD, t.0 as u64, p, 0),
            TimerCommand::Delete(t) => (TAG_DELETE, t.0 as u64, 0, 0),
            TimerCommand::PendCall(f, arg, word) => {
                (TAG_PEND_CALL, f as usize as u64, arg as u64, word as u64)
            }
        };
        let mut item = RawItem::new();
        let _ = item.push(tag);
        let _ = item.extend_from_slice(&a.to_le_bytes());
        let _ = item.extend_from_slice(&b.to_le_bytes());
        let _ = item.extend_from_slice(&c.to_le_bytes());
        item
    }

    fn decode(item: &[u8]) -> Option<Self> {
        if item.len() != CMD_ITEM_SIZE {
            return None;
        }
        let word = |i: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&item[1 + i * 8..9 + i * 8]);
            u64::from_le_bytes(b)
        };
        let (a, b, c) = (word(0), word(1), word(2));
        Some(match item[0] {
            TAG_START => TimerCommand::Start(TimerId(a as usize)),
            TAG_STOP => TimerCommand::Stop(TimerId(a as usize)),
            TAG_CHANGE_PERIOD => TimerCommand::ChangePeriod(TimerId(a as usize), b),
            TAG_DELETE => TimerCommand::Delete(TimerId(a as usize)),
            TAG_PEND_CALL => {
                // The address was produced from a PendedFunction by encode.
                let f = unsafe { core::mem::transmute::<usize, PendedFunction>(a as usize) };
                TimerCommand::PendCall(f, b as usize, c as u32)
            }
            _ => return None,
        })
    }
}

// =============================================================================
// Kernel timer operations
// =============================================================================

impl Kernel {
    pub(crate) fn init_timer_service(&mut self) -> Result<(), RtosError> {
        let queue = self.create_queue_raw(QueueKind::Queue, TIMER_QUEUE_DEPTH, CMD_ITEM_SIZE, 0)?;
        self.timers.cmd_queue = Some(queue);
        let daemon = self.create_task_raw("TmrSvc", TaskEntry::TimerDaemon, TIMER_TASK_PRIORITY)?;
        self.timers.daemon = Some(daemon);
        Ok(())
    }

    /// Create a dormant timer. `period` is in ticks and must be nonzero;
    /// `payload` is an opaque context word for the callback.
    pub fn create_timer(
        &mut self,
        name: &str,
        period: Tick,
        mode: TimerMode,
        payload: u32,
        callback: TimerCallback,
    ) -> Result<TimerId, RtosError> {
        if period == 0 {
            return Err(RtosError::InvalidArgument);
        }
        let mut stored = String::new();
        let _ = stored.push_str(name);
        let id = TimerId(self.timers.pool.alloc(Timer {
            name: stored,
            period,
            mode,
            payload,
            callback,
            active: false,
        })?);
        Ok(id)
    }

    /// Queue a start command: the timer is (re-)armed for `now + period`
    /// when the daemon processes it. `Blocked`/`TimedOut` follow queue
    /// send semantics when the command queue is full.
    pub fn timer_start(&mut self, timer: TimerId, timeout: Timeout) -> Result<SendOutcome, RtosError> {
        self.timer_ref(timer)?;
        self.send_timer_command(TimerCommand::Start(timer), timeout)
    }

    /// Queue a stop command: the timer goes dormant without firing.
    pub fn timer_stop(&mut self, timer: TimerId, timeout: Timeout) -> Result<SendOutcome, RtosError> {
        self.timer_ref(timer)?;
        self.send_timer_command(TimerCommand::Stop(timer), timeout)
    }

    /// Queue a period change. The timer is re-armed for
    /// `now + new_period` from when the daemon processes the command,
    /// even if it was dormant.
    pub fn timer_change_period(
        &mut self,
        timer: TimerId,
        new_period: Tick,
        timeout: Timeout,
    ) -> Result<SendOutcome, RtosError> {
        if new_period == 0 {
            return Err(RtosError::InvalidArgument);
        }
        self.timer_ref(timer)?;
        self.send_timer_command(TimerCommand::ChangePeriod(timer, new_period), timeout)
    }

    /// Queue a delete. The slot is freed by the daemon; an expiry already
    /// queued behind the delete is dropped.
    pub fn timer_delete(&mut self, timer: TimerId, timeout: Timeout) -> Result<SendOutcome, RtosError> {
        self.timer_ref(timer)?;
        self.send_timer_command(TimerCommand::Delete(timer), timeout)
    }

    /// Hand `f` to the daemon to run in task context with the two
    /// context words. The task-side half of centralized deferral; also
    /// usable from tasks to serialize work behind the timer queue.
    pub fn pend_function_call(
        &mut self,
        f: PendedFunction,
        arg: usize,
        word: u32,
        timeout: Timeout,
    ) -> Result<SendOutcome, RtosError> {
        self.send_timer_command(TimerCommand::PendCall(f, arg, word), timeout)
    }

    // ISR-safe command variants: never block, `Full` when the command
    // queue has no room.

    pub fn timer_start_from_isr(&mut self, timer: TimerId) -> Result<IsrOutcome, RtosError> {
        self.timer_ref(timer)?;
        self.send_timer_command_from_isr(TimerCommand::Start(timer))
    }

    pub fn timer_stop_from_isr(&mut self, timer: TimerId) -> Result<IsrOutcome, RtosError> {
        self.timer_ref(timer)?;
        self.send_timer_command_from_isr(TimerCommand::Stop(timer))
    }

    pub fn timer_change_period_from_isr(
        &mut self,
        timer: TimerId,
        new_period: Tick,
    ) -> Result<IsrOutcome, RtosError> {
        if new_period == 0 {
            return Err(RtosError::InvalidArgument);
        }
        self.timer_ref(timer)?;
        self.send_timer_command_from_isr(TimerCommand::ChangePeriod(timer, new_period))
    }

    /// The interrupt-side half of centralized deferral: the handler
    /// records what to do, the daemon does it in task context.
    pub fn pend_function_call_from_isr(
        &mut self,
        f: PendedFunction,
        arg: usize,
        word: u32,
    ) -> Result<IsrOutcome, RtosError> {
        self.send_timer_command_from_isr(TimerCommand::PendCall(f, arg, word))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Armed and counting toward an expiry?
    pub fn timer_is_active(&self, timer: TimerId) -> Result<bool, RtosError> {
        self.timer_ref(timer).map(|t| t.active)
    }

    pub fn timer_period(&self, timer: TimerId) -> Result<Tick, RtosError> {
        self.timer_ref(timer).map(|t| t.period)
    }

    pub fn timer_name(&self, timer: TimerId) -> Result<&str, RtosError> {
        self.timer_ref(timer).map(|t| t.name.as_str())
    }

    /// The context word given at creation (or updated since).
    pub fn timer_payload(&self, timer: TimerId) -> Result<u32, RtosError> {
        self.timer_ref(timer).map(|t| t.payload)
    }

    /// Update the context word. Takes effect for the next callback run.
    pub fn set_timer_payload(&mut self, timer: TimerId, payload: u32) -> Result<(), RtosError> {
        self.timers
            .pool
            .get_mut(timer.0)
            .ok_or(RtosError::InvalidHandle)
            .map(|t| t.payload = payload)
    }

    /// The daemon task's id, e.g. for priority queries.
    pub fn timer_daemon_task(&self) -> Option<TaskId> {
        self.timers.daemon
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn timer_ref(&self, timer: TimerId) -> Result<&Timer, RtosError> {
        self.timers.pool.get(timer.0).ok_or(RtosError::InvalidHandle)
    }

    fn send_timer_command(
        &mut self,
        cmd: TimerCommand,
        timeout: Timeout,
    ) -> Result<SendOutcome, RtosError> {
        let queue = self.timers.cmd_queue.ok_or(RtosError::InvalidOperation)?;
        self.queue_send(queue, &cmd.encode(), timeout)
    }

    fn send_timer_command_from_isr(&mut self, cmd: TimerCommand) -> Result<IsrOutcome, RtosError> {
        let queue = self.timers.cmd_queue.ok_or(RtosError::InvalidOperation)?;
        self.queue_send_from_isr(queue, &cmd.encode())
    }

    /// The daemon task's body. Runs whenever the daemon is dispatched
    /// and returns once the daemon has blocked on its command queue
    /// (which dispatches the next task).
    pub(crate) fn timer_daemon_step(&mut self) {
        let daemon = match self.timers.daemon {
            Some(d) => d,
            None => return,
        };
        // A command delivered while the daemon was blocked arrives
        // through its wake-result slot.
        if let Some(WakeResult::Received(item)) = self.take_wake_result(daemon) {
            if let Some(cmd) = TimerCommand::decode(&item) {
                self.process_timer_command(cmd);
            }
        }
        loop {
            // Fire everything due.
            while let Some(timer) = self.timers.active.pop_expired(self.tick_count) {
                self.fire_timer(timer);
            }
            let queue = match self.timers.cmd_queue {
                Some(q) => q,
                None => return,
            };
            // Drain commands without blocking.
            if let Ok(ReceiveOutcome::Received(item)) = self.queue_receive(queue, Timeout::None) {
                if let Some(cmd) = TimerCommand::decode(&item) {
                    self.process_timer_command(cmd);
                }
                continue;
            }
            // Sleep until the next expiry, or a command if none is armed.
            let timeout = match self.timers.active.next_deadline() {
                Some(deadline) if deadline > self.tick_count => {
                    Timeout::Ticks(deadline - self.tick_count)
                }
                Some(_) => continue,
                None => Timeout::Forever,
            };
            match self.queue_receive(queue, timeout) {
                Ok(ReceiveOutcome::Blocked) => return,
                Ok(ReceiveOutcome::Received(item)) => {
                    if let Some(cmd) = TimerCommand::decode(&item) {
                        self.process_timer_command(cmd);
                    }
                }
                Err(_) => return,
            }
        }
    }

    fn process_timer_command(&mut self, cmd: TimerCommand) {
        let now = self.tick_count;
        match cmd {
            TimerCommand::Start(id) => {
                if let Some(t) = self.timers.pool.get_mut(id.0) {
                    t.active = true;
                    let expiry = now + t.period;
                    self.timers.active.remove(id);
                    self.timers.active.insert(id, expiry);
                    trace::timer_armed(id, expiry);
                }
            }
            TimerCommand::Stop(id) => {
                if let Some(t) = self.timers.pool.get_mut(id.0) {
                    t.active = false;
                    self.timers.active.remove(id);
                }
            }
            TimerCommand::ChangePeriod(id, period) => {
                if let Some(t) = self.timers.pool.get_mut(id.0) {
                    t.period = period;
                    t.active = true;
                    let expiry = now + period;
                    self.timers.active.remove(id);
                    self.timers.active.insert(id, expiry);
                    trace::timer_armed(id, expiry);
                }
            }
            TimerCommand::Delete(id) => {
                self.timers.active.remove(id);
                self.timers.pool.free(id.0);
            }
            TimerCommand::PendCall(f, arg, word) => {
                f(self, arg, word);
            }
        }
    }

    fn fire_timer(&mut self, id: TimerId) {
        let (callback, reload) = {
            let t = match self.timers.pool.get_mut(id.0) {
                Some(t) => t,
                // Deleted behind an already-popped expiry.
                None => return,
            };
            match t.mode {
                TimerMode::AutoReload => (t.callback, Some(t.period)),
                TimerMode::OneShot => {
                    t.active = false;
                    (t.callback, None)
                }
            }
        };
        if let Some(period) = reload {
            let expiry = self.tick_count + period;
            self.timers.active.insert(id, expiry);
        }
        trace::timer_expired(id);
        callback(self, id);
    }
}
