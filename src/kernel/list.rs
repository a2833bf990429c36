//! Arena storage and the ordered lists the scheduler runs on.
//!
//! Kernel objects live in fixed-capacity arenas and refer to each other by
//! index, never by pointer; that keeps tasks, queues and wait-list entries
//! free of ownership cycles. Wait lists are kept sorted by effective
//! priority (highest first) with FIFO order among equals, which is the
//! order in which blocked tasks are woken.

use heapless::Vec;

use crate::config::MAX_TASKS;
use crate::types::{RtosError, TaskId, Tick};

// =============================================================================
// Arena
// =============================================================================

/// Fixed-capacity slot store. Freed slots are reused; indices are handed
/// out as handles.
pub(crate) struct Arena<T, const N: usize> {
    slots: [Option<T>; N],
}

impl<T, const N: usize> Arena<T, N> {
    pub fn new() -> Self {
        Arena {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Place `value` in a free slot, returning its index.
    pub fn alloc(&mut self, value: T) -> Result<usize, RtosError> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(value);
                return Ok(i);
            }
        }
        Err(RtosError::ResourceExhausted)
    }

    /// Remove and return the value at `index`.
    pub fn free(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Indices of all live slots.
    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i)
    }
}

// =============================================================================
// Wait list
// =============================================================================

/// Tasks blocked on one object, ordered by effective priority then
/// arrival. The priority is captured at insertion and updated explicitly
/// when inheritance boosts a waiter.
#[derive(Default)]
pub(crate) struct WaitList {
    entries: Vec<(TaskId, u8), MAX_TASKS>,
}

impl WaitList {
    pub const fn new() -> Self {
        WaitList {
            entries: Vec::new(),
        }
    }

    /// Insert behind every waiter of equal or higher priority.
    pub fn insert(&mut self, task: TaskId, priority: u8) {
        let pos = self
            .entries
            .iter()
            .position(|&(_, p)| p < priority)
            .unwrap_or(self.entries.len());
        // Capacity equals MAX_TASKS, so this cannot fail.
        let _ = self.entries.insert(pos, (task, priority));
    }

    /// Highest-priority, longest-waiting task, without removing it.
    pub fn front(&self) -> Option<TaskId> {
        self.entries.first().map(|&(t, _)| t)
    }

    /// Remove and return the highest-priority, longest-waiting task.
    pub fn pop_front(&mut self) -> Option<TaskId> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0).0)
        }
    }

    /// Remove a specific task; true if it was present.
    pub fn remove(&mut self, task: TaskId) -> bool {
        if let Some(pos) = self.entries.iter().position(|&(t, _)| t == task) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Re-sort one waiter after its effective priority changed.
    pub fn reposition(&mut self, task: TaskId, new_priority: u8) {
        if self.remove(task) {
            self.insert(task, new_priority);
        }
    }

    /// Highest waiter priority, if anyone is waiting.
    pub fn top_priority(&self) -> Option<u8> {
        self.entries.first().map(|&(_, p)| p)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.entries.iter().map(|&(t, _)| t)
    }
}

// =============================================================================
// Deadline list
// =============================================================================

/// Entries sorted by ascending deadline, FIFO among equals. Used for the
/// delayed-task list and the active-timer list.
pub(crate) struct DeadlineList<I: Copy + PartialEq, const N: usize> {
    entries: Vec<(I, Tick), N>,
}

impl<I: Copy + PartialEq, const N: usize> DeadlineList<I, N> {
    pub const fn new() -> Self {
        DeadlineList {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, id: I, deadline: Tick) {
        let pos = self
            .entries
            .iter()
            .position(|&(_, d)| d > deadline)
            .unwrap_or(self.entries.len());
        let _ = self.entries.insert(pos, (id, deadline));
    }

    /// Earliest deadline in the list.
    pub fn next_deadline(&self) -> Option<Tick> {
        self.entries.first().map(|&(_, d)| d)
    }

    /// Remove and return the front entry if its deadline has passed.
    pub fn pop_expired(&mut self, now: Tick) -> Option<I> {
        match self.entries.first() {
            Some(&(_, d)) if d <= now => Some(self.entries.remove(0).0),
            _ => None,
        }
    }

    pub fn remove(&mut self, id: I) -> bool {
        if let Some(pos) = self.entries.iter().position(|&(i, _)| i == id) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: I) -> bool {
        self.entries.iter().any(|&(i, _)| i == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
