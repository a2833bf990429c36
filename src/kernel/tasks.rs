//! Task control blocks and the scheduler core.
//!
//! Dispatch always selects the highest-priority Ready task; equal
//! priorities share the core in strict FIFO rotation driven by the tick.
//! A task made Ready by data arrival, a semaphore give or a timeout
//! preempts the running task synchronously when its effective priority is
//! higher — immediately at the wake, not at the next tick — unless the
//! kernel is inside an ISR bracket, where the switch is deferred to
//! interrupt exit.

use heapless::String;

use crate::config::{IDLE_PRIORITY, MAX_NAME_LEN, MAX_PRIORITIES};
use crate::trace;
use crate::types::{
    EventBits, IsrOutcome, QueueId, RawItem, RtosError, TaskFn, TaskId, TaskState, Tick, Timeout,
    WakeResult,
};

use super::Kernel;

// =============================================================================
// Task control block
// =============================================================================

/// What a task entered the Blocked state for. Used to detach the task
/// from the right wait list on timeout, suspension or deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockedOn {
    QueueSend(QueueId),
    QueueReceive(QueueId),
    /// Waits with the receivers but leaves the item in place on wake.
    QueuePeek(QueueId),
    /// Semaphore or mutex take; waits with the receivers.
    SemTake(QueueId),
    EventWait(crate::types::EventGroupId),
    Notify,
    Delay,
}

/// Entry point of a task, tagged by kind. Application entries carry a
/// typed function and its argument; the idle task and the timer daemon
/// are kernel-owned bodies.
#[derive(Clone, Copy)]
pub(crate) enum TaskEntry {
    Entry(TaskFn, usize),
    Idle,
    TimerDaemon,
}

/// Item a blocked sender is waiting to place into a queue. The kernel
/// completes the send on the sender's behalf when space frees up.
pub(crate) struct PendingSend {
    pub bytes: RawItem,
    pub to_front: bool,
}

/// Predicate recorded by a blocked event-group waiter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EventWait {
    pub mask: EventBits,
    pub wait_all: bool,
    pub clear_on_exit: bool,
}

/// How a blocked notification waiter consumes the slot at wake.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NotifyWait {
    /// `notify_wait`: optionally reset the Pending state on exit.
    Wait { clear_on_exit: bool },
    /// `notify_take`: treat the value as a counter; clear it to zero or
    /// decrement it by one.
    Take { clear_all: bool },
}

/// The scheduler's record for one task.
pub(crate) struct Tcb {
    pub name: String<MAX_NAME_LEN>,
    #[allow(dead_code)] // invoked by a real port's trampoline, carried here
    pub entry: TaskEntry,
    pub base_priority: u8,
    /// May sit above `base_priority` while the task holds a contended
    /// priority-inheriting mutex.
    pub effective_priority: u8,
    pub state: TaskState,
    pub block: Option<BlockedOn>,
    pub deadline: Option<Tick>,
    pub wake_result: Option<WakeResult>,
    pub pending_send: Option<PendingSend>,
    pub event_wait: Option<EventWait>,
    pub notify_pending: bool,
    pub notify_value: u32,
    pub notify_wait: Option<NotifyWait>,
    pub mutexes_held: u8,
}

impl Tcb {
    fn new(name: &str, entry: TaskEntry, priority: u8) -> Self {
        let mut n: String<MAX_NAME_LEN> = String::new();
        for c in name.chars() {
            if n.push(c).is_err() {
                break;
            }
        }
        Tcb {
            name: n,
            entry,
            base_priority: priority,
            effective_priority: priority,
            state: TaskState::Ready,
            block: None,
            deadline: None,
            wake_result: None,
            pending_send: None,
            event_wait: None,
            notify_pending: false,
            notify_value: 0,
            notify_wait: None,
            mutexes_held: 0,
        }
    }
}

// =============================================================================
// Scheduler core
// =============================================================================

impl Kernel {
    /// Create a task. The entry routine runs with `arg` once a port
    /// starts executing task code; the scheduler itself only tracks it.
    ///
    /// Fails with `ResourceExhausted` when the TCB pool is empty and
    /// `InvalidArgument` for an out-of-range priority. If the scheduler
    /// is running and the new task outranks the current one, it preempts
    /// immediately.
    pub fn create_task(
        &mut self,
        name: &str,
        entry: TaskFn,
        priority: u8,
        arg: usize,
    ) -> Result<TaskId, RtosError> {
        self.create_task_raw(name, TaskEntry::Entry(entry, arg), priority)
    }

    pub(crate) fn create_task_raw(
        &mut self,
        name: &str,
        entry: TaskEntry,
        priority: u8,
    ) -> Result<TaskId, RtosError> {
        if priority as usize >= MAX_PRIORITIES {
            return Err(RtosError::InvalidArgument);
        }
        let id = TaskId(self.tcbs.alloc(Tcb::new(name, entry, priority))?);
        trace::task_created(id, name, priority);
        let _ = self.ready[priority as usize].push_back(id);
        if self.started {
            self.preempt_if_higher(priority);
        }
        Ok(id)
    }

    pub(crate) fn create_idle_task(&mut self) -> Result<TaskId, RtosError> {
        self.create_task_raw("IDLE", TaskEntry::Idle, IDLE_PRIORITY)
    }

    /// Delete a task and return its slot to the pool. Deleting the idle
    /// task or the timer daemon is rejected. Deleting a task that holds
    /// a mutex leaves that mutex permanently taken — a design-time
    /// defect this kernel does not detect.
    pub fn delete_task(&mut self, task: TaskId) -> Result<(), RtosError> {
        if Some(task) == self.idle_task || Some(task) == self.timers.daemon {
            return Err(RtosError::InvalidOperation);
        }
        let state = self.task_state(task)?;
        match state {
            TaskState::Ready => self.ready_remove(task),
            TaskState::Blocked => {
                let _ = self.detach_from_object(task);
                self.delayed.remove(task);
            }
            TaskState::Running | TaskState::Suspended => {}
            TaskState::Terminated => return Err(RtosError::InvalidHandle),
        }
        if self.current == Some(task) {
            self.current = None;
        }
        if let Some(t) = self.tcbs.get_mut(task.0) {
            t.state = TaskState::Terminated;
        }
        trace::task_deleted(task);
        self.tcbs.free(task.0);
        if self.current.is_none() && self.started {
            self.dispatch();
        }
        Ok(())
    }

    /// Move a task to the Suspended side-state. A suspended task is
    /// excluded from scheduling until resumed; if it was blocked, the
    /// pending operation is abandoned and reports `TimedOut` on resume.
    pub fn suspend(&mut self, task: TaskId) -> Result<(), RtosError> {
        let state = self.task_state(task)?;
        match state {
            TaskState::Suspended => return Ok(()),
            TaskState::Terminated => return Err(RtosError::InvalidHandle),
            TaskState::Ready => self.ready_remove(task),
            TaskState::Blocked => {
                let result = self.detach_from_object(task);
                self.delayed.remove(task);
                if let Some(t) = self.tcbs.get_mut(task.0) {
                    t.wake_result = Some(result);
                }
            }
            TaskState::Running => {}
        }
        if let Some(t) = self.tcbs.get_mut(task.0) {
            t.state = TaskState::Suspended;
            t.block = None;
            t.deadline = None;
        }
        trace::task_suspended(task);
        if self.current == Some(task) {
            self.current = None;
            if self.started {
                self.dispatch();
            }
        }
        Ok(())
    }

    /// Resume a suspended task, preempting the current one if the
    /// resumed task outranks it.
    pub fn resume(&mut self, task: TaskId) -> Result<(), RtosError> {
        if self.task_state(task)? != TaskState::Suspended {
            return Err(RtosError::InvalidOperation);
        }
        let prio = self.effective_priority(task)?;
        if let Some(t) = self.tcbs.get_mut(task.0) {
            t.state = TaskState::Ready;
        }
        let _ = self.ready[prio as usize].push_back(task);
        trace::task_resumed(task);
        self.preempt_if_higher(prio);
        Ok(())
    }

    /// ISR-safe resume: never switches synchronously; the returned
    /// outcome must be folded into the handler's [`YieldRequest`]
    /// (crate::types::YieldRequest).
    pub fn resume_from_isr(&mut self, task: TaskId) -> Result<IsrOutcome, RtosError> {
        let prev = self.in_isr;
        self.in_isr = true;
        let result = self.resume(task);
        self.in_isr = prev;
        result.map(|()| {
            Kernel::isr_outcome(self.is_higher_than_current(task))
        })
    }

    /// Change a task's base priority. The effective priority is
    /// recomputed respecting any active inheritance boost; it is never
    /// lowered below the priority of the highest waiter on a mutex the
    /// task holds.
    pub fn set_priority(&mut self, task: TaskId, priority: u8) -> Result<(), RtosError> {
        if priority as usize >= MAX_PRIORITIES {
            return Err(RtosError::InvalidArgument);
        }
        self.tcb_mut(task)?.base_priority = priority;
        let eff = self.computed_effective_priority(task)?;
        self.apply_effective_priority(task, eff)?;
        // Lowering the running task may let a ready task through;
        // raising a ready task may preempt the running one.
        if self.started && !self.in_isr && !self.in_daemon {
            self.reschedule_if_outranked();
        }
        Ok(())
    }

    /// Voluntarily hand the core to the next task of equal (or higher)
    /// priority. A no-op when the running task has no ready peer.
    pub fn yield_now(&mut self) -> Result<(), RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        let cur = match self.running_priority() {
            Some(p) => p,
            None => return Err(RtosError::InvalidOperation),
        };
        match self.highest_ready_priority() {
            Some(best) if best >= cur => {
                self.move_current_to_ready(false);
                self.dispatch();
            }
            _ => {}
        }
        Ok(())
    }

    /// Sleep for `ticks` measured from now. Spacing between periodic
    /// wakes drifts by the caller's processing time; periodic tasks
    /// should prefer [`Kernel::delay_until`].
    pub fn delay_for(&mut self, ticks: Tick) -> Result<(), RtosError> {
        if ticks == 0 {
            return self.yield_now();
        }
        let deadline = self.tick_count + ticks;
        self.block_current(BlockedOn::Delay, Some(deadline))
    }

    /// Sleep until `*last_wake + period`, then advance `*last_wake` by
    /// `period`. Because the next wake is computed from the previous
    /// absolute wake time, preemption between calls does not accumulate
    /// drift. Returns `false` when the deadline had already passed and
    /// no delay occurred.
    pub fn delay_until(&mut self, last_wake: &mut Tick, period: Tick) -> Result<bool, RtosError> {
        if period == 0 {
            return Err(RtosError::InvalidArgument);
        }
        let next = *last_wake + period;
        *last_wake = next;
        if next > self.tick_count {
            self.block_current(BlockedOn::Delay, Some(next))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Tick handler, called from the tick interrupt inside the ISR
    /// bracket. Advances time, wakes expired waits (delivering
    /// `TimedOut` to abandoned operations), and reports whether a
    /// context switch should be requested at interrupt exit — either
    /// because a wake outranked the running task or because an
    /// equal-priority peer is due its time slice.
    pub fn tick(&mut self) -> Result<IsrOutcome, RtosError> {
        if !self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        self.tick_count += 1;
        let now = self.tick_count;
        let mut switch = false;
        while let Some(task) = self.delayed.pop_expired(now) {
            switch |= self.expire_block(task);
        }
        if let Some(cur) = self.running_priority() {
            if !self.ready[cur as usize].is_empty() {
                switch = true;
            }
        }
        Ok(Kernel::isr_outcome(switch))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn task_state(&self, task: TaskId) -> Result<TaskState, RtosError> {
        self.tcb(task).map(|t| t.state)
    }

    pub fn base_priority(&self, task: TaskId) -> Result<u8, RtosError> {
        self.tcb(task).map(|t| t.base_priority)
    }

    pub fn effective_priority(&self, task: TaskId) -> Result<u8, RtosError> {
        self.tcb(task).map(|t| t.effective_priority)
    }

    pub fn task_name(&self, task: TaskId) -> Result<&str, RtosError> {
        self.tcb(task).map(|t| t.name.as_str())
    }

    /// Consume the result of this task's last blocked operation. The
    /// slot is filled when a blocked task is made Ready and read by the
    /// task (or the harness acting as it) when it next runs.
    pub fn take_wake_result(&mut self, task: TaskId) -> Option<WakeResult> {
        self.tcb_mut(task).ok().and_then(|t| t.wake_result.take())
    }

    // =========================================================================
    // Internal: TCB access
    // =========================================================================

    pub(crate) fn tcb(&self, task: TaskId) -> Result<&Tcb, RtosError> {
        self.tcbs.get(task.0).ok_or(RtosError::InvalidHandle)
    }

    pub(crate) fn tcb_mut(&mut self, task: TaskId) -> Result<&mut Tcb, RtosError> {
        self.tcbs.get_mut(task.0).ok_or(RtosError::InvalidHandle)
    }

    /// Effective priority of the running task, if one is Running.
    pub(crate) fn running_priority(&self) -> Option<u8> {
        let cur = self.current?;
        let t = self.tcbs.get(cur.0)?;
        if t.state == TaskState::Running {
            Some(t.effective_priority)
        } else {
            None
        }
    }

    pub(crate) fn is_higher_than_current(&self, task: TaskId) -> bool {
        match (self.tcb(task), self.running_priority()) {
            (Ok(t), Some(cur)) => t.effective_priority > cur,
            _ => false,
        }
    }

    // =========================================================================
    // Internal: ready/dispatch machinery
    // =========================================================================

    pub(crate) fn highest_ready_priority(&self) -> Option<u8> {
        (0..MAX_PRIORITIES)
            .rev()
            .find(|&p| !self.ready[p].is_empty())
            .map(|p| p as u8)
    }

    pub(crate) fn ready_remove(&mut self, task: TaskId) {
        if let Ok(prio) = self.effective_priority(task) {
            let level = &mut self.ready[prio as usize];
            // Deque has no remove-at; rotate through it once.
            let len = level.len();
            for _ in 0..len {
                if let Some(t) = level.pop_front() {
                    if t != task {
                        let _ = level.push_back(t);
                    }
                }
            }
        }
    }

    /// Demote the running task to Ready, at the front of its level when
    /// it is being preempted (keeps its turn) or at the back when it is
    /// rotating out (yield/time slice).
    pub(crate) fn move_current_to_ready(&mut self, to_front: bool) {
        let cur = match self.current {
            Some(c) => c,
            None => return,
        };
        let prio = match self.tcbs.get_mut(cur.0) {
            Some(t) if t.state == TaskState::Running => {
                t.state = TaskState::Ready;
                t.effective_priority
            }
            _ => return,
        };
        if to_front {
            let _ = self.ready[prio as usize].push_front(cur);
        } else {
            let _ = self.ready[prio as usize].push_back(cur);
        }
    }

    /// Select and switch in the highest-priority ready task.
    pub(crate) fn dispatch(&mut self) {
        for p in (0..MAX_PRIORITIES).rev() {
            if let Some(task) = self.ready[p].pop_front() {
                self.switch_in(task);
                return;
            }
        }
        self.current = None;
    }

    fn switch_in(&mut self, task: TaskId) {
        if let Some(t) = self.tcbs.get_mut(task.0) {
            t.state = TaskState::Running;
        }
        let prev = self.current;
        self.current = Some(task);
        trace::switched_in(prev, task);
        // The timer daemon's body is kernel code: run it whenever it is
        // dispatched. It ends by blocking on its command queue, which
        // dispatches the next task.
        if Some(task) == self.timers.daemon && !self.in_daemon {
            self.in_daemon = true;
            self.timer_daemon_step();
            self.in_daemon = false;
        }
    }

    /// Preempt the running task if `priority` outranks it. Inside an ISR
    /// or the daemon body the switch is deferred instead.
    pub(crate) fn preempt_if_higher(&mut self, priority: u8) {
        if self.in_isr || self.in_daemon || !self.started {
            return;
        }
        match self.running_priority() {
            Some(cur) if priority > cur => {
                self.move_current_to_ready(true);
                self.dispatch();
            }
            None => self.dispatch(),
            _ => {}
        }
    }

    /// Re-dispatch if any ready task outranks the running one.
    pub(crate) fn reschedule_if_outranked(&mut self) {
        if let Some(best) = self.highest_ready_priority() {
            self.preempt_if_higher(best);
        }
    }

    // =========================================================================
    // Internal: blocking and waking
    // =========================================================================

    pub(crate) fn resolve_deadline(&self, timeout: Timeout) -> Option<Tick> {
        match timeout {
            Timeout::None | Timeout::Forever => None,
            Timeout::Ticks(n) => Some(self.tick_count + n),
        }
    }

    /// Block the running task on `on`, with an optional absolute wake
    /// deadline, and dispatch the next task. Legal only from task
    /// context with the scheduler started.
    pub(crate) fn block_current(
        &mut self,
        on: BlockedOn,
        deadline: Option<Tick>,
    ) -> Result<(), RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        let cur = match self.current {
            Some(c) if self.started => c,
            _ => return Err(RtosError::InvalidOperation),
        };
        {
            let t = self.tcb_mut(cur)?;
            t.state = TaskState::Blocked;
            t.block = Some(on);
            t.deadline = deadline;
        }
        if let Some(d) = deadline {
            self.delayed.insert(cur, d);
        }
        trace::task_blocked(cur);
        self.dispatch();
        Ok(())
    }

    /// Make a blocked task Ready with `result` in its wake slot.
    /// Returns true if the woken task outranks the running one; in task
    /// context that preemption has already happened by the time this
    /// returns.
    pub(crate) fn unblock(&mut self, task: TaskId, result: WakeResult) -> bool {
        self.delayed.remove(task);
        let prio = match self.tcbs.get_mut(task.0) {
            Some(t) => {
                t.block = None;
                t.deadline = None;
                t.wake_result = Some(result);
                t.state = TaskState::Ready;
                t.effective_priority
            }
            None => return false,
        };
        let _ = self.ready[prio as usize].push_back(task);
        trace::task_readied(task);
        let higher = match self.running_priority() {
            Some(cur) => prio > cur,
            None => self.started,
        };
        if higher && !self.in_isr && !self.in_daemon {
            self.preempt_if_higher(prio);
        }
        higher
    }

    /// A blocked task's deadline elapsed: detach it from whatever it
    /// waits on and wake it with the timeout result. Returns true if it
    /// outranks the running task.
    fn expire_block(&mut self, task: TaskId) -> bool {
        let result = self.detach_from_object(task);
        self.unblock(task, result)
    }

    /// Remove a blocked task from the wait list of the object named in
    /// its `BlockedOn`, dropping any stashed state, and produce the
    /// result its abandoned operation reports.
    pub(crate) fn detach_from_object(&mut self, task: TaskId) -> WakeResult {
        let on = match self.tcb(task) {
            Ok(t) => t.block,
            Err(_) => None,
        };
        match on {
            Some(BlockedOn::QueueSend(q)) => {
                if let Some(queue) = self.queues.get_mut(q.0) {
                    queue.senders.remove(task);
                }
                if let Ok(t) = self.tcb_mut(task) {
                    t.pending_send = None;
                }
                WakeResult::TimedOut(None)
            }
            Some(BlockedOn::QueueReceive(q))
            | Some(BlockedOn::QueuePeek(q))
            | Some(BlockedOn::SemTake(q)) => {
                if let Some(queue) = self.queues.get_mut(q.0) {
                    queue.receivers.remove(task);
                }
                WakeResult::TimedOut(None)
            }
            Some(BlockedOn::EventWait(g)) => {
                let bits = match self.events.get_mut(g.0) {
                    Some(group) => {
                        group.waiters.remove(task);
                        group.bits
                    }
                    None => 0,
                };
                if let Ok(t) = self.tcb_mut(task) {
                    t.event_wait = None;
                }
                WakeResult::TimedOut(Some(bits))
            }
            Some(BlockedOn::Notify) => {
                if let Ok(t) = self.tcb_mut(task) {
                    t.notify_wait = None;
                }
                WakeResult::TimedOut(None)
            }
            Some(BlockedOn::Delay) => WakeResult::DelayElapsed,
            None => WakeResult::TimedOut(None),
        }
    }

    // =========================================================================
    // Internal: effective priority maintenance
    // =========================================================================

    /// Base priority raised by the highest waiter on any mutex the task
    /// holds — the inheritance bound.
    pub(crate) fn computed_effective_priority(&self, task: TaskId) -> Result<u8, RtosError> {
        let mut eff = self.tcb(task)?.base_priority;
        for qi in self.queues.ids() {
            if let Some(queue) = self.queues.get(qi) {
                if queue.holder == Some(task) {
                    if let Some(top) = queue.receivers.top_priority() {
                        eff = eff.max(top);
                    }
                }
            }
        }
        Ok(eff)
    }

    /// Set a task's effective priority, re-sorting it through whichever
    /// list it currently sits in.
    pub(crate) fn apply_effective_priority(
        &mut self,
        task: TaskId,
        new_eff: u8,
    ) -> Result<(), RtosError> {
        let (old_eff, state, on) = {
            let t = self.tcb(task)?;
            (t.effective_priority, t.state, t.block)
        };
        if old_eff == new_eff {
            return Ok(());
        }
        match state {
            TaskState::Ready => {
                self.ready_remove(task);
                self.tcb_mut(task)?.effective_priority = new_eff;
                let _ = self.ready[new_eff as usize].push_back(task);
            }
            TaskState::Blocked => {
                self.tcb_mut(task)?.effective_priority = new_eff;
                match on {
                    Some(BlockedOn::QueueSend(q)) => {
                        if let Some(queue) = self.queues.get_mut(q.0) {
                            queue.senders.reposition(task, new_eff);
                        }
                    }
                    Some(BlockedOn::QueueReceive(q))
                    | Some(BlockedOn::QueuePeek(q))
                    | Some(BlockedOn::SemTake(q)) => {
                        if let Some(queue) = self.queues.get_mut(q.0) {
                            queue.receivers.reposition(task, new_eff);
                        }
                    }
                    Some(BlockedOn::EventWait(g)) => {
                        if let Some(group) = self.events.get_mut(g.0) {
                            group.waiters.reposition(task, new_eff);
                        }
                    }
                    _ => {}
                }
            }
            _ => {
                self.tcb_mut(task)?.effective_priority = new_eff;
            }
        }
        trace::priority_changed(task, old_eff, new_eff);
        Ok(())
    }
}
