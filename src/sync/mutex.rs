//! Mutex handle.
//!
//! Unlike `std::sync::Mutex` this protects no data and returns no guard:
//! it is a lock in the RTOS sense, bracketing a critical region between
//! `take` and `give`. The usual hazards apply and the kernel detects
//! none of them:
//!
//! - a non-recursive re-take by the holder deadlocks the holder;
//! - a `give` without a matching `take` is rejected (`NotHolder`), but a
//!   forgotten `give` leaves the lock taken forever;
//! - priority inheritance bounds inversion while a waiter is blocked; it
//!   is damage limitation, not a design substitute for keeping critical
//!   regions short.
//!
//! Not usable from interrupt context at all; ISRs should defer to a task
//! instead.

use crate::kernel::Kernel;
use crate::types::{MutexId, RtosError, TakeOutcome, TaskId, Timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutex {
    id: MutexId,
}

impl Mutex {
    /// A plain mutex: a second take by the holder blocks against itself.
    pub fn new(kernel: &mut Kernel) -> Result<Self, RtosError> {
        Ok(Mutex {
            id: kernel.create_mutex()?,
        })
    }

    /// A recursive mutex: the holder may nest takes, releasing on the
    /// give matching the outermost take.
    pub fn new_recursive(kernel: &mut Kernel) -> Result<Self, RtosError> {
        Ok(Mutex {
            id: kernel.create_recursive_mutex()?,
        })
    }

    pub fn id(&self) -> MutexId {
        self.id
    }

    pub fn take(&self, kernel: &mut Kernel, timeout: Timeout) -> Result<TakeOutcome, RtosError> {
        kernel.mutex_take(self.id, timeout)
    }

    pub fn give(&self, kernel: &mut Kernel) -> Result<(), RtosError> {
        kernel.mutex_give(self.id)
    }

    pub fn holder(&self, kernel: &Kernel) -> Result<Option<TaskId>, RtosError> {
        kernel.mutex_holder(self.id)
    }
}
