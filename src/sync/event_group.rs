//! Event group handle.

use crate::kernel::Kernel;
use crate::types::{EventBits, EventGroupId, EventWaitOutcome, IsrOutcome, RtosError, Timeout};

/// A 24-bit flag field plus a wait list: one setter can release many
/// waiters, and `sync` turns it into an N-way rendezvous barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventGroup {
    id: EventGroupId,
}

impl EventGroup {
    pub fn new(kernel: &mut Kernel) -> Result<Self, RtosError> {
        Ok(EventGroup {
            id: kernel.create_event_group()?,
        })
    }

    pub fn id(&self) -> EventGroupId {
        self.id
    }

    pub fn set_bits(&self, kernel: &mut Kernel, mask: EventBits) -> Result<EventBits, RtosError> {
        kernel.event_set_bits(self.id, mask)
    }

    pub fn clear_bits(&self, kernel: &mut Kernel, mask: EventBits) -> Result<EventBits, RtosError> {
        kernel.event_clear_bits(self.id, mask)
    }

    pub fn get_bits(&self, kernel: &Kernel) -> Result<EventBits, RtosError> {
        kernel.event_get_bits(self.id)
    }

    pub fn wait_bits(
        &self,
        kernel: &mut Kernel,
        mask: EventBits,
        clear_on_exit: bool,
        wait_for_all: bool,
        timeout: Timeout,
    ) -> Result<EventWaitOutcome, RtosError> {
        kernel.event_wait_bits(self.id, mask, clear_on_exit, wait_for_all, timeout)
    }

    /// Set `this_bits`, then wait for every bit of `all_bits`: the
    /// rendezvous point for a fixed set of participants.
    pub fn sync(
        &self,
        kernel: &mut Kernel,
        this_bits: EventBits,
        all_bits: EventBits,
        timeout: Timeout,
    ) -> Result<EventWaitOutcome, RtosError> {
        kernel.event_sync(self.id, this_bits, all_bits, timeout)
    }

    /// Deferred through the timer daemon; see
    /// [`Kernel::event_set_bits_from_isr`].
    pub fn set_bits_from_isr(
        &self,
        kernel: &mut Kernel,
        mask: EventBits,
    ) -> Result<IsrOutcome, RtosError> {
        kernel.event_set_bits_from_isr(self.id, mask)
    }

    pub fn clear_bits_from_isr(
        &self,
        kernel: &mut Kernel,
        mask: EventBits,
    ) -> Result<IsrOutcome, RtosError> {
        kernel.event_clear_bits_from_isr(self.id, mask)
    }
}
