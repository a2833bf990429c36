//! Counting semaphores, binary semaphores and priority-inheriting mutexes.
//!
//! All three are queues of item size zero: the token count is the queue's
//! occupancy and takers wait on the queue's receiver list, so wake order
//! and timeout handling come from [`super::queue`] unchanged. Mutexes add
//! a holder record and priority inheritance: while a higher-priority task
//! waits, the holder runs at the waiter's effective priority, and the
//! boost is unwound from the remaining held mutexes on give.

use crate::trace;
use crate::types::{
    IsrOutcome, MutexId, QueueId, RtosError, SemaphoreId, TakeOutcome, TaskId, Timeout, WakeResult,
};

use super::queue::QueueKind;
use super::tasks::BlockedOn;
use super::Kernel;

impl Kernel {
    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a binary semaphore, initially empty (a give must come first).
    pub fn create_binary_semaphore(&mut self) -> Result<SemaphoreId, RtosError> {
        let id = self.create_queue_raw(QueueKind::BinarySemaphore, 1, 0, 0)?;
        Ok(SemaphoreId(id))
    }

    /// Create a counting semaphore with `initial` of `max` tokens.
    pub fn create_counting_semaphore(
        &mut self,
        max: usize,
        initial: usize,
    ) -> Result<SemaphoreId, RtosError> {
        if max == 0 || initial > max {
            return Err(RtosError::InvalidArgument);
        }
        let id = self.create_queue_raw(QueueKind::CountingSemaphore, max, 0, initial)?;
        Ok(SemaphoreId(id))
    }

    /// Create a mutex. Available from creation; gives are rejected for
    /// anyone but the holder.
    pub fn create_mutex(&mut self) -> Result<MutexId, RtosError> {
        let id = self.create_queue_raw(QueueKind::Mutex { recursive: false }, 1, 0, 1)?;
        Ok(MutexId(id))
    }

    /// Create a recursive mutex: the holder may re-take it, and must give
    /// it once per take before it is released.
    pub fn create_recursive_mutex(&mut self) -> Result<MutexId, RtosError> {
        let id = self.create_queue_raw(QueueKind::Mutex { recursive: true }, 1, 0, 1)?;
        Ok(MutexId(id))
    }

    // =========================================================================
    // Semaphore give / take
    // =========================================================================

    /// Release one token. Never blocks: `Full` when the semaphore is
    /// already at its maximum count. Waking a higher-priority taker
    /// preempts the caller immediately.
    pub fn semaphore_give(&mut self, sem: SemaphoreId) -> Result<(), RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        self.check_semaphore(sem)?;
        self.give_token(sem.0)?;
        Ok(())
    }

    /// Take one token, blocking while the count is zero.
    pub fn semaphore_take(
        &mut self,
        sem: SemaphoreId,
        timeout: Timeout,
    ) -> Result<TakeOutcome, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        self.check_semaphore(sem)?;
        self.take_token(sem.0, timeout)
    }

    /// ISR-safe give, typically the completion half of a deferred
    /// interrupt handshake.
    pub fn semaphore_give_from_isr(&mut self, sem: SemaphoreId) -> Result<IsrOutcome, RtosError> {
        self.check_semaphore(sem)?;
        let prev = self.in_isr;
        self.in_isr = true;
        let result = self.give_token(sem.0);
        self.in_isr = prev;
        result.map(Kernel::isr_outcome)
    }

    /// ISR-safe take: `Empty` instead of blocking.
    pub fn semaphore_take_from_isr(&mut self, sem: SemaphoreId) -> Result<IsrOutcome, RtosError> {
        self.check_semaphore(sem)?;
        let prev = self.in_isr;
        self.in_isr = true;
        let result = (|| {
            let q = self.queues.get_mut(sem.0 .0).ok_or(RtosError::InvalidHandle)?;
            if q.count == 0 {
                return Err(RtosError::Empty);
            }
            q.count -= 1;
            Ok(IsrOutcome::Completed)
        })();
        self.in_isr = prev;
        result
    }

    /// Current token count.
    pub fn semaphore_count(&self, sem: SemaphoreId) -> Result<usize, RtosError> {
        self.check_semaphore(sem)?;
        self.queue_ref(sem.0).map(|q| q.count)
    }

    // =========================================================================
    // Mutex take / give
    // =========================================================================

    /// Acquire the mutex, blocking while another task holds it.
    ///
    /// Not legal from interrupt context. While the caller waits, the
    /// holder inherits the caller's effective priority if it is higher.
    /// A non-recursive re-take by the holder blocks against itself; with
    /// a `Forever` timeout that is a self-deadlock the kernel does not
    /// detect.
    pub fn mutex_take(&mut self, mutex: MutexId, timeout: Timeout) -> Result<TakeOutcome, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        let cur = self.current.ok_or(RtosError::InvalidOperation)?;
        let recursive = self.check_mutex(mutex)?;
        let qid = mutex.0;

        let acquired = {
            let q = self.queues.get_mut(qid.0).ok_or(RtosError::InvalidHandle)?;
            if q.count > 0 {
                q.count -= 1;
                q.holder = Some(cur);
                true
            } else if recursive && q.holder == Some(cur) {
                q.recursion += 1;
                return Ok(TakeOutcome::Taken);
            } else {
                false
            }
        };
        if acquired {
            self.tcb_mut(cur)?.mutexes_held += 1;
            return Ok(TakeOutcome::Taken);
        }
        if timeout.is_immediate() {
            return Err(RtosError::Empty);
        }
        // Contended: join the waiter list, then boost the holder to the
        // top waiter's effective priority.
        let prio = self.effective_priority(cur)?;
        let deadline = self.resolve_deadline(timeout);
        let holder = {
            let q = self.queues.get_mut(qid.0).ok_or(RtosError::InvalidHandle)?;
            q.receivers.insert(cur, prio);
            q.holder
        };
        if let Some(holder) = holder {
            let eff = self.computed_effective_priority(holder)?;
            if eff != self.effective_priority(holder)? {
                trace::priority_inherited(holder, eff);
                self.apply_effective_priority(holder, eff)?;
            }
        }
        self.block_current(BlockedOn::SemTake(qid), deadline)?;
        Ok(TakeOutcome::Blocked)
    }

    /// Release the mutex.
    ///
    /// `NotHolder` unless the caller holds it. For a recursive mutex the
    /// lock is only released by the give matching the outermost take.
    /// Releasing unwinds any inherited priority to what the remaining
    /// held mutexes justify, then hands the lock to the highest-priority
    /// waiter.
    pub fn mutex_give(&mut self, mutex: MutexId) -> Result<(), RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        let cur = self.current.ok_or(RtosError::InvalidOperation)?;
        self.check_mutex(mutex)?;
        let qid = mutex.0;

        {
            let q = self.queues.get_mut(qid.0).ok_or(RtosError::InvalidHandle)?;
            if q.holder != Some(cur) {
                return Err(RtosError::NotHolder);
            }
            if q.recursion > 0 {
                q.recursion -= 1;
                return Ok(());
            }
            q.holder = None;
            q.count = 1;
        }
        self.tcb_mut(cur)?.mutexes_held -= 1;

        // Disinherit before handing over; the remaining held mutexes (and
        // the base priority) decide the new effective priority.
        let eff = self.computed_effective_priority(cur)?;
        if eff != self.effective_priority(cur)? {
            trace::priority_disinherited(cur, eff);
            self.apply_effective_priority(cur, eff)?;
        }

        // Hand the lock to the top waiter, boosted by those still behind it.
        let next = {
            let q = self.queues.get_mut(qid.0).ok_or(RtosError::InvalidHandle)?;
            match q.receivers.pop_front() {
                Some(next) => {
                    q.count = 0;
                    q.holder = Some(next);
                    Some(next)
                }
                None => None,
            }
        };
        if let Some(next) = next {
            self.tcb_mut(next)?.mutexes_held += 1;
            let eff = self.computed_effective_priority(next)?;
            self.tcb_mut(next)?.effective_priority = eff;
            let _ = self.unblock(next, WakeResult::Taken);
        }
        // The give may have lowered the caller below a ready task.
        self.reschedule_if_outranked();
        Ok(())
    }

    /// The task currently holding the mutex, if any.
    pub fn mutex_holder(&self, mutex: MutexId) -> Result<Option<TaskId>, RtosError> {
        self.check_mutex(mutex)?;
        self.queue_ref(mutex.0).map(|q| q.holder)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn check_semaphore(&self, sem: SemaphoreId) -> Result<(), RtosError> {
        match self.queue_ref(sem.0)?.kind {
            QueueKind::BinarySemaphore | QueueKind::CountingSemaphore => Ok(()),
            _ => Err(RtosError::InvalidOperation),
        }
    }

    /// `Ok(recursive)` when the handle names a live mutex.
    fn check_mutex(&self, mutex: MutexId) -> Result<bool, RtosError> {
        match self.queue_ref(mutex.0)?.kind {
            QueueKind::Mutex { recursive } => Ok(recursive),
            _ => Err(RtosError::InvalidOperation),
        }
    }

    /// Add a token, or hand it straight to the top waiter. Returns
    /// whether a woken taker outranks the running task.
    fn give_token(&mut self, qid: QueueId) -> Result<bool, RtosError> {
        let taker = {
            let q = self.queues.get_mut(qid.0).ok_or(RtosError::InvalidHandle)?;
            match q.receivers.pop_front() {
                Some(taker) => Some(taker),
                None => {
                    if q.count >= q.capacity {
                        return Err(RtosError::Full);
                    }
                    q.count += 1;
                    None
                }
            }
        };
        match taker {
            Some(taker) => Ok(self.unblock(taker, WakeResult::Taken)),
            None => Ok(false),
        }
    }

    fn take_token(&mut self, qid: QueueId, timeout: Timeout) -> Result<TakeOutcome, RtosError> {
        {
            let q = self.queues.get_mut(qid.0).ok_or(RtosError::InvalidHandle)?;
            if q.count > 0 {
                q.count -= 1;
                return Ok(TakeOutcome::Taken);
            }
        }
        if timeout.is_immediate() {
            return Err(RtosError::Empty);
        }
        let cur = self.current.ok_or(RtosError::InvalidOperation)?;
        let prio = self.effective_priority(cur)?;
        let deadline = self.resolve_deadline(timeout);
        if let Some(q) = self.queues.get_mut(qid.0) {
            q.receivers.insert(cur, prio);
        }
        self.block_current(BlockedOn::SemTake(qid), deadline)?;
        Ok(TakeOutcome::Blocked)
    }
}
