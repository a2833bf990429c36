//! Software timer handle.
//!
//! Callbacks run in the timer daemon task, never in interrupt context,
//! and must not block: a blocking callback stalls every other timer.

use crate::kernel::{Kernel, TimerCallback};
use crate::types::{IsrOutcome, RtosError, SendOutcome, Tick, TimerId, TimerMode, Timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    id: TimerId,
}

impl Timer {
    /// Create a dormant timer; arm it with [`Timer::start`].
    pub fn new(
        kernel: &mut Kernel,
        name: &str,
        period: Tick,
        mode: TimerMode,
        payload: u32,
        callback: TimerCallback,
    ) -> Result<Self, RtosError> {
        Ok(Timer {
            id: kernel.create_timer(name, period, mode, payload, callback)?,
        })
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn start(&self, kernel: &mut Kernel, timeout: Timeout) -> Result<SendOutcome, RtosError> {
        kernel.timer_start(self.id, timeout)
    }

    pub fn stop(&self, kernel: &mut Kernel, timeout: Timeout) -> Result<SendOutcome, RtosError> {
        kernel.timer_stop(self.id, timeout)
    }

    pub fn change_period(
        &self,
        kernel: &mut Kernel,
        new_period: Tick,
        timeout: Timeout,
    ) -> Result<SendOutcome, RtosError> {
        kernel.timer_change_period(self.id, new_period, timeout)
    }

    /// Consumes the handle; the slot is freed by the daemon.
    pub fn delete(self, kernel: &mut Kernel, timeout: Timeout) -> Result<SendOutcome, RtosError> {
        kernel.timer_delete(self.id, timeout)
    }

    pub fn start_from_isr(&self, kernel: &mut Kernel) -> Result<IsrOutcome, RtosError> {
        kernel.timer_start_from_isr(self.id)
    }

    pub fn stop_from_isr(&self, kernel: &mut Kernel) -> Result<IsrOutcome, RtosError> {
        kernel.timer_stop_from_isr(self.id)
    }

    pub fn is_active(&self, kernel: &Kernel) -> Result<bool, RtosError> {
        kernel.timer_is_active(self.id)
    }

    pub fn period(&self, kernel: &Kernel) -> Result<Tick, RtosError> {
        kernel.timer_period(self.id)
    }

    pub fn payload(&self, kernel: &Kernel) -> Result<u32, RtosError> {
        kernel.timer_payload(self.id)
    }

    pub fn set_payload(&self, kernel: &mut Kernel, payload: u32) -> Result<(), RtosError> {
        kernel.set_timer_payload(self.id, payload)
    }
}
