//! Direct-to-task notifications.
//!
//! Every task carries one built-in notification slot: a 32-bit value and
//! a Pending flag. Notifying is cheaper than any shared object because
//! the target is a task, not a queue with a wait list, which makes the
//! give/take pair the lightest-weight deferral handshake available. The
//! cost is the restriction: one slot, one consumer, no broadcast.

use crate::types::{
    IsrOutcome, NotifyAction, NotifyWaitOutcome, RtosError, TaskId, Timeout, WakeResult,
};

use super::tasks::{BlockedOn, NotifyWait};
use super::Kernel;

impl Kernel {
    /// Notify `task`, mutating its slot per `action` and marking it
    /// Pending. If the target is blocked in a notification wait it is
    /// released at once (preempting the caller when it outranks it).
    ///
    /// `AlreadyPending` is only reported for `SetValueWithoutOverwrite`
    /// against an unconsumed value; a target currently waiting consumes
    /// immediately, so the overwrite is allowed then.
    pub fn task_notify(
        &mut self,
        task: TaskId,
        value: u32,
        action: NotifyAction,
    ) -> Result<(), RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        let _ = self.notify_inner(task, value, action)?;
        Ok(())
    }

    /// ISR-safe [`Kernel::task_notify`].
    pub fn task_notify_from_isr(
        &mut self,
        task: TaskId,
        value: u32,
        action: NotifyAction,
    ) -> Result<IsrOutcome, RtosError> {
        let prev = self.in_isr;
        self.in_isr = true;
        let result = self.notify_inner(task, value, action);
        self.in_isr = prev;
        result.map(Kernel::isr_outcome)
    }

    /// Increment the target's slot: the lightweight-semaphore give.
    pub fn notify_give(&mut self, task: TaskId) -> Result<(), RtosError> {
        self.task_notify(task, 0, NotifyAction::Increment)
    }

    /// ISR-safe [`Kernel::notify_give`].
    pub fn notify_give_from_isr(&mut self, task: TaskId) -> Result<IsrOutcome, RtosError> {
        self.task_notify_from_isr(task, 0, NotifyAction::Increment)
    }

    /// Wait for this task's slot to become Pending, then consume it and
    /// return the value. With `clear_on_exit` the Pending state is reset
    /// as the value is read. The try-once form reports `Empty`.
    pub fn notify_wait(
        &mut self,
        clear_on_exit: bool,
        timeout: Timeout,
    ) -> Result<NotifyWaitOutcome, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        let cur = self.current.ok_or(RtosError::InvalidOperation)?;
        {
            let t = self.tcb_mut(cur)?;
            if t.notify_pending {
                let value = t.notify_value;
                if clear_on_exit {
                    t.notify_pending = false;
                }
                return Ok(NotifyWaitOutcome::Notified(value));
            }
        }
        if timeout.is_immediate() {
            return Err(RtosError::Empty);
        }
        let deadline = self.resolve_deadline(timeout);
        self.tcb_mut(cur)?.notify_wait = Some(NotifyWait::Wait { clear_on_exit });
        self.block_current(BlockedOn::Notify, deadline)?;
        Ok(NotifyWaitOutcome::Blocked)
    }

    /// Take from this task's slot treated as a counter: wait for a
    /// nonzero value, then either zero it (`clear_all`, binary-semaphore
    /// flavor) or decrement it by one (counting flavor). Returns the
    /// value before the clear/decrement.
    pub fn notify_take(
        &mut self,
        clear_all: bool,
        timeout: Timeout,
    ) -> Result<NotifyWaitOutcome, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        let cur = self.current.ok_or(RtosError::InvalidOperation)?;
        {
            let t = self.tcb_mut(cur)?;
            if t.notify_value > 0 {
                let value = t.notify_value;
                t.notify_value = if clear_all { 0 } else { value - 1 };
                t.notify_pending = t.notify_value != 0;
                return Ok(NotifyWaitOutcome::Notified(value));
            }
        }
        if timeout.is_immediate() {
            return Err(RtosError::Empty);
        }
        let deadline = self.resolve_deadline(timeout);
        self.tcb_mut(cur)?.notify_wait = Some(NotifyWait::Take { clear_all });
        self.block_current(BlockedOn::Notify, deadline)?;
        Ok(NotifyWaitOutcome::Blocked)
    }

    /// The target's slot value, without consuming.
    pub fn notify_value(&self, task: TaskId) -> Result<u32, RtosError> {
        self.tcb(task).map(|t| t.notify_value)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Apply the action and release the target if it waits. Returns
    /// whether the woken target outranks the running task.
    fn notify_inner(
        &mut self,
        task: TaskId,
        value: u32,
        action: NotifyAction,
    ) -> Result<bool, RtosError> {
        let wake_value = {
            let t = self.tcb_mut(task)?;
            let waiting = matches!(t.block, Some(BlockedOn::Notify));
            match action {
                NotifyAction::NoAction => {}
                NotifyAction::SetBits => t.notify_value |= value,
                NotifyAction::Increment => t.notify_value = t.notify_value.wrapping_add(1),
                NotifyAction::SetValueWithOverwrite => t.notify_value = value,
                NotifyAction::SetValueWithoutOverwrite => {
                    if t.notify_pending && !waiting {
                        return Err(RtosError::AlreadyPending);
                    }
                    t.notify_value = value;
                }
            }
            t.notify_pending = true;
            if !waiting {
                return Ok(false);
            }
            // Consume on the waiter's behalf, per the wait it parked.
            match t.notify_wait.take() {
                Some(NotifyWait::Wait { clear_on_exit }) => {
                    let v = t.notify_value;
                    if clear_on_exit {
                        t.notify_pending = false;
                    }
                    v
                }
                Some(NotifyWait::Take { clear_all }) => {
                    let v = t.notify_value;
                    t.notify_value = if clear_all { 0 } else { v.saturating_sub(1) };
                    t.notify_pending = t.notify_value != 0;
                    v
                }
                // Blocked on Notify without a parked wait cannot happen.
                None => t.notify_value,
            }
        };
        Ok(self.unblock(task, WakeResult::Notified(wake_value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::started_kernel;
    use crate::types::YieldRequest;

    #[test]
    fn set_value_without_overwrite_respects_pending() {
        let mut k = started_kernel(&[("a", 2), ("b", 1)]);
        let a = k.current_task().unwrap();
        // Move off a so another task can notify it.
        k.delay_for(100).unwrap();
        k.task_notify(a, 7, NotifyAction::SetValueWithoutOverwrite)
            .unwrap();
        assert_eq!(
            k.task_notify(a, 8, NotifyAction::SetValueWithoutOverwrite),
            Err(RtosError::AlreadyPending)
        );
        assert_eq!(k.notify_value(a).unwrap(), 7);
        k.task_notify(a, 9, NotifyAction::SetValueWithOverwrite)
            .unwrap();
        assert_eq!(k.notify_value(a).unwrap(), 9);
    }

    #[test]
    fn pending_notification_is_consumed_without_blocking() {
        let mut k = started_kernel(&[("a", 3), ("b", 1)]);
        let a = k.current_task().unwrap();
        k.delay_for(10).unwrap();
        k.task_notify(a, 0b1010, NotifyAction::SetBits).unwrap();
        k.advance_ticks(10);
        assert_eq!(k.current_task(), Some(a));
        // Already pending: the wait returns at once.
        assert_eq!(
            k.notify_wait(true, Timeout::Forever).unwrap(),
            NotifyWaitOutcome::Notified(0b1010)
        );
        // Consumed: the try-once form now fails.
        assert_eq!(k.notify_wait(true, Timeout::None), Err(RtosError::Empty));
    }

    #[test]
    fn notify_wakes_blocked_waiter_with_the_value() {
        let mut k = started_kernel(&[("waiter", 4), ("notifier", 1)]);
        let waiter = k.current_task().unwrap();
        assert_eq!(
            k.notify_wait(true, Timeout::Forever).unwrap(),
            NotifyWaitOutcome::Blocked
        );
        let notifier = k.current_task().unwrap();
        assert_ne!(waiter, notifier);
        k.task_notify(waiter, 42, NotifyAction::SetValueWithOverwrite)
            .unwrap();
        assert_eq!(k.current_task(), Some(waiter));
        assert_eq!(k.take_wake_result(waiter), Some(WakeResult::Notified(42)));
        // clear_on_exit consumed the pending state.
        assert_eq!(k.notify_wait(true, Timeout::None), Err(RtosError::Empty));
    }

    #[test]
    fn give_take_acts_as_counting_semaphore() {
        let mut k = started_kernel(&[("worker", 3), ("producer", 1)]);
        let worker = k.current_task().unwrap();
        k.delay_for(1).unwrap();
        k.notify_give(worker).unwrap();
        k.notify_give(worker).unwrap();
        k.advance_ticks(1);
        assert_eq!(k.current_task(), Some(worker));
        assert_eq!(
            k.notify_take(false, Timeout::None).unwrap(),
            NotifyWaitOutcome::Notified(2)
        );
        assert_eq!(
            k.notify_take(false, Timeout::None).unwrap(),
            NotifyWaitOutcome::Notified(1)
        );
        assert_eq!(k.notify_take(false, Timeout::None), Err(RtosError::Empty));
    }

    #[test]
    fn take_with_clear_all_zeroes_the_counter() {
        let mut k = started_kernel(&[("worker", 3), ("producer", 1)]);
        let worker = k.current_task().unwrap();
        k.delay_for(1).unwrap();
        for _ in 0..3 {
            k.notify_give(worker).unwrap();
        }
        k.advance_ticks(1);
        assert_eq!(
            k.notify_take(true, Timeout::None).unwrap(),
            NotifyWaitOutcome::Notified(3)
        );
        assert_eq!(k.notify_value(worker).unwrap(), 0);
    }

    #[test]
    fn notify_from_isr_wakes_worker_at_exit() {
        let mut k = started_kernel(&[("worker", 4), ("bg", 1)]);
        let worker = k.current_task().unwrap();
        assert_eq!(
            k.notify_take(true, Timeout::Forever).unwrap(),
            NotifyWaitOutcome::Blocked
        );
        let bg = k.current_task().unwrap();

        k.isr_enter();
        let mut y = YieldRequest::new();
        let outcome = k.notify_give_from_isr(worker).unwrap();
        assert_eq!(outcome, IsrOutcome::CompletedWokeHigherPriority);
        y.fold(outcome);
        assert_eq!(k.current_task(), Some(bg));
        k.isr_exit(y);

        assert_eq!(k.current_task(), Some(worker));
        assert_eq!(k.take_wake_result(worker), Some(WakeResult::Notified(1)));
    }

    #[test]
    fn notify_wait_times_out() {
        let mut k = started_kernel(&[("t", 3), ("bg", 1)]);
        let t = k.current_task().unwrap();
        assert_eq!(
            k.notify_wait(true, Timeout::Ticks(2)).unwrap(),
            NotifyWaitOutcome::Blocked
        );
        k.advance_ticks(2);
        assert_eq!(k.current_task(), Some(t));
        assert_eq!(k.take_wake_result(t), Some(WakeResult::TimedOut(None)));
    }
}
