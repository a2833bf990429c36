//! Binary and counting semaphore handles.

use crate::kernel::Kernel;
use crate::types::{IsrOutcome, RtosError, SemaphoreId, TakeOutcome, Timeout};

/// One-token semaphore: the canonical task/ISR signalling handshake.
/// Created empty; the first give makes the token available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinarySemaphore {
    id: SemaphoreId,
}

impl BinarySemaphore {
    pub fn new(kernel: &mut Kernel) -> Result<Self, RtosError> {
        Ok(BinarySemaphore {
            id: kernel.create_binary_semaphore()?,
        })
    }

    pub fn id(&self) -> SemaphoreId {
        self.id
    }

    pub fn give(&self, kernel: &mut Kernel) -> Result<(), RtosError> {
        kernel.semaphore_give(self.id)
    }

    pub fn take(&self, kernel: &mut Kernel, timeout: Timeout) -> Result<TakeOutcome, RtosError> {
        kernel.semaphore_take(self.id, timeout)
    }

    pub fn give_from_isr(&self, kernel: &mut Kernel) -> Result<IsrOutcome, RtosError> {
        kernel.semaphore_give_from_isr(self.id)
    }

    pub fn take_from_isr(&self, kernel: &mut Kernel) -> Result<IsrOutcome, RtosError> {
        kernel.semaphore_take_from_isr(self.id)
    }
}

/// Multi-token semaphore for resource pools and event counting. An ISR
/// that gives once per event lets a worker drain events one take at a
/// time without losing any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountingSemaphore {
    id: SemaphoreId,
}

impl CountingSemaphore {
    pub fn new(kernel: &mut Kernel, max: usize, initial: usize) -> Result<Self, RtosError> {
        Ok(CountingSemaphore {
            id: kernel.create_counting_semaphore(max, initial)?,
        })
    }

    pub fn id(&self) -> SemaphoreId {
        self.id
    }

    pub fn give(&self, kernel: &mut Kernel) -> Result<(), RtosError> {
        kernel.semaphore_give(self.id)
    }

    pub fn take(&self, kernel: &mut Kernel, timeout: Timeout) -> Result<TakeOutcome, RtosError> {
        kernel.semaphore_take(self.id, timeout)
    }

    pub fn give_from_isr(&self, kernel: &mut Kernel) -> Result<IsrOutcome, RtosError> {
        kernel.semaphore_give_from_isr(self.id)
    }

    pub fn take_from_isr(&self, kernel: &mut Kernel) -> Result<IsrOutcome, RtosError> {
        kernel.semaphore_take_from_isr(self.id)
    }

    pub fn count(&self, kernel: &Kernel) -> Result<usize, RtosError> {
        kernel.semaphore_count(self.id)
    }
}
