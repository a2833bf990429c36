//! Event groups: many-to-many flag rendezvous.
//!
//! A group is a 24-bit flag field plus a wait list. Setting bits walks
//! every waiter, wakes those whose condition now holds, and only then
//! applies the union of their clear-on-exit masks, so simultaneous
//! waiters on overlapping bits all observe the satisfying field. The
//! high 8 bits are reserved and rejected in every mask.

use heapless::Vec;

use crate::config::MAX_TASKS;
use crate::trace;
use crate::types::{
    EventBits, EventGroupId, EventWaitOutcome, IsrOutcome, RtosError, TaskId, Timeout, WakeResult,
};

use super::list::WaitList;
use super::tasks::{BlockedOn, EventWait};
use super::Kernel;

/// Usable event bits; the rest are reserved.
pub const EVENT_BITS_MASK: EventBits = 0x00FF_FFFF;

pub(crate) struct EventGroup {
    pub bits: EventBits,
    pub waiters: WaitList,
}

// Daemon-side halves of the ISR-safe operations; the group id travels
// through the pended call's context words.
fn deferred_set_bits(kernel: &mut Kernel, group: usize, mask: u32) {
    let _ = kernel.event_set_bits(EventGroupId(group), mask);
}

fn deferred_clear_bits(kernel: &mut Kernel, group: usize, mask: u32) {
    let _ = kernel.event_clear_bits(EventGroupId(group), mask);
}

fn satisfied(bits: EventBits, mask: EventBits, wait_all: bool) -> bool {
    if wait_all {
        bits & mask == mask
    } else {
        bits & mask != 0
    }
}

fn check_mask(mask: EventBits) -> Result<(), RtosError> {
    if mask == 0 || mask & !EVENT_BITS_MASK != 0 {
        return Err(RtosError::InvalidArgument);
    }
    Ok(())
}

impl Kernel {
    /// Create an event group with all bits clear.
    pub fn create_event_group(&mut self) -> Result<EventGroupId, RtosError> {
        let id = self.events.alloc(EventGroup {
            bits: 0,
            waiters: WaitList::new(),
        })?;
        Ok(EventGroupId(id))
    }

    /// Delete an event group. Rejected while any task waits on it.
    pub fn delete_event_group(&mut self, group: EventGroupId) -> Result<(), RtosError> {
        if !self.group_ref(group)?.waiters.is_empty() {
            return Err(RtosError::InvalidOperation);
        }
        self.events.free(group.0);
        Ok(())
    }

    /// Set `mask` bits, waking every waiter whose condition now holds.
    ///
    /// Returns the bit field after the woken waiters' clear-on-exit
    /// masks were applied. A woken higher-priority waiter preempts the
    /// caller immediately.
    pub fn event_set_bits(
        &mut self,
        group: EventGroupId,
        mask: EventBits,
    ) -> Result<EventBits, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        check_mask(mask)?;
        self.set_bits_walk(group, mask)?;
        Ok(self.group_ref(group)?.bits)
    }

    /// Clear `mask` bits. Never wakes anyone; returns the field before
    /// the clear.
    pub fn event_clear_bits(
        &mut self,
        group: EventGroupId,
        mask: EventBits,
    ) -> Result<EventBits, RtosError> {
        check_mask(mask)?;
        let g = self.events.get_mut(group.0).ok_or(RtosError::InvalidHandle)?;
        let prev = g.bits;
        g.bits &= !mask;
        Ok(prev)
    }

    /// Current bit field.
    pub fn event_get_bits(&self, group: EventGroupId) -> Result<EventBits, RtosError> {
        self.group_ref(group).map(|g| g.bits)
    }

    /// Wait until the masked bits satisfy the condition.
    ///
    /// `wait_for_all` demands every bit in `mask`; otherwise any one
    /// suffices. With `clear_on_exit` the satisfying bits in `mask` are
    /// cleared as the waiter is released. The try-once forms return
    /// `Unmatched` with the current field instead of blocking.
    pub fn event_wait_bits(
        &mut self,
        group: EventGroupId,
        mask: EventBits,
        clear_on_exit: bool,
        wait_for_all: bool,
        timeout: Timeout,
    ) -> Result<EventWaitOutcome, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        check_mask(mask)?;
        {
            let g = self.events.get_mut(group.0).ok_or(RtosError::InvalidHandle)?;
            if satisfied(g.bits, mask, wait_for_all) {
                let snapshot = g.bits;
                if clear_on_exit {
                    g.bits &= !mask;
                }
                return Ok(EventWaitOutcome::Matched(snapshot));
            }
            if timeout.is_immediate() {
                return Ok(EventWaitOutcome::Unmatched(g.bits));
            }
        }
        self.block_on_group(
            group,
            EventWait {
                mask,
                wait_all: wait_for_all,
                clear_on_exit,
            },
            timeout,
        )?;
        Ok(EventWaitOutcome::Blocked)
    }

    /// Rendezvous: set `this_bits`, then wait until every bit of
    /// `all_bits` is set. When the last participant arrives, everyone is
    /// released with the full field and `all_bits` is cleared atomically,
    /// so no participant can observe a partially-cleared rendezvous.
    ///
    /// `this_bits` must be a subset of `all_bits`; a caller whose own
    /// bits are outside the awaited set could deadlock the rendezvous,
    /// so that is rejected as `InvalidArgument`.
    pub fn event_sync(
        &mut self,
        group: EventGroupId,
        this_bits: EventBits,
        all_bits: EventBits,
        timeout: Timeout,
    ) -> Result<EventWaitOutcome, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        check_mask(this_bits)?;
        check_mask(all_bits)?;
        if this_bits & all_bits != this_bits {
            return Err(RtosError::InvalidArgument);
        }
        // The set may release earlier arrivals, whose clear-on-exit masks
        // already clear all_bits; judge completion on the pre-clear field.
        let (pre_clear, _) = self.set_bits_walk(group, this_bits)?;
        if pre_clear & all_bits == all_bits {
            let g = self.events.get_mut(group.0).ok_or(RtosError::InvalidHandle)?;
            g.bits &= !all_bits;
            return Ok(EventWaitOutcome::Matched(pre_clear));
        }
        if timeout.is_immediate() {
            return Ok(EventWaitOutcome::Unmatched(pre_clear));
        }
        self.block_on_group(
            group,
            EventWait {
                mask: all_bits,
                wait_all: true,
                clear_on_exit: true,
            },
            timeout,
        )?;
        Ok(EventWaitOutcome::Blocked)
    }

    /// ISR-safe set: defers the set (and its waiter walk) to the timer
    /// daemon through the timer command queue. `Full` when the command
    /// queue has no room.
    pub fn event_set_bits_from_isr(
        &mut self,
        group: EventGroupId,
        mask: EventBits,
    ) -> Result<IsrOutcome, RtosError> {
        check_mask(mask)?;
        self.group_ref(group)?;
        self.pend_function_call_from_isr(deferred_set_bits, group.0, mask)
    }

    /// ISR-safe clear, deferred like [`Kernel::event_set_bits_from_isr`].
    pub fn event_clear_bits_from_isr(
        &mut self,
        group: EventGroupId,
        mask: EventBits,
    ) -> Result<IsrOutcome, RtosError> {
        check_mask(mask)?;
        self.group_ref(group)?;
        self.pend_function_call_from_isr(deferred_clear_bits, group.0, mask)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn group_ref(&self, group: EventGroupId) -> Result<&EventGroup, RtosError> {
        self.events.get(group.0).ok_or(RtosError::InvalidHandle)
    }

    fn block_on_group(
        &mut self,
        group: EventGroupId,
        wait: EventWait,
        timeout: Timeout,
    ) -> Result<(), RtosError> {
        let cur = self.current.ok_or(RtosError::InvalidOperation)?;
        let prio = self.effective_priority(cur)?;
        let deadline = self.resolve_deadline(timeout);
        self.tcb_mut(cur)?.event_wait = Some(wait);
        if let Some(g) = self.events.get_mut(group.0) {
            g.waiters.insert(cur, prio);
        }
        self.block_current(BlockedOn::EventWait(group), deadline)
    }

    /// Set bits and release satisfied waiters. Returns the field after
    /// the set but before the clears, and whether a woken waiter
    /// outranks the running task.
    pub(crate) fn set_bits_walk(
        &mut self,
        group: EventGroupId,
        mask: EventBits,
    ) -> Result<(EventBits, bool), RtosError> {
        let (pre_clear, waiting): (EventBits, Vec<TaskId, MAX_TASKS>) = {
            let g = self.events.get_mut(group.0).ok_or(RtosError::InvalidHandle)?;
            g.bits |= mask;
            (g.bits, g.waiters.iter().collect())
        };
        trace::event_bits_set(group, mask, pre_clear);

        let mut released: Vec<TaskId, MAX_TASKS> = Vec::new();
        let mut clear_union: EventBits = 0;
        for task in waiting {
            let wait = match self.tcb(task).map(|t| t.event_wait) {
                Ok(Some(w)) => w,
                _ => continue,
            };
            if satisfied(pre_clear, wait.mask, wait.wait_all) {
                let _ = released.push(task);
                if wait.clear_on_exit {
                    clear_union |= wait.mask;
                }
            }
        }

        // Clears apply before anyone resumes, so released tasks that read
        // the group afterwards see the post-rendezvous field.
        {
            let g = self.events.get_mut(group.0).ok_or(RtosError::InvalidHandle)?;
            g.bits &= !clear_union;
            for &task in &released {
                g.waiters.remove(task);
            }
        }
        let mut woke_higher = false;
        for task in released {
            if let Ok(t) = self.tcb_mut(task) {
                t.event_wait = None;
            }
            woke_higher |= self.unblock(task, WakeResult::EventBitsMatched(pre_clear));
        }
        Ok((pre_clear, woke_higher))
    }
}
