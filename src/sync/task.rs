//! Task handle.

use crate::kernel::Kernel;
use crate::types::{
    IsrOutcome, NotifyAction, NotifyWaitOutcome, RtosError, TaskFn, TaskId, TaskState, Timeout,
};

/// Handle to one task, wrapping the kernel's task and notification
/// operations that target a specific task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
}

impl Task {
    /// Create a Ready task. Preempts the caller immediately if the
    /// scheduler is running and the new task outranks it.
    pub fn spawn(
        kernel: &mut Kernel,
        name: &str,
        entry: TaskFn,
        priority: u8,
        arg: usize,
    ) -> Result<Self, RtosError> {
        Ok(Task {
            id: kernel.create_task(name, entry, priority, arg)?,
        })
    }

    /// Wrap an id obtained from the kernel, e.g.
    /// [`Kernel::current_task`].
    pub fn from_id(id: TaskId) -> Self {
        Task { id }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn suspend(&self, kernel: &mut Kernel) -> Result<(), RtosError> {
        kernel.suspend(self.id)
    }

    pub fn resume(&self, kernel: &mut Kernel) -> Result<(), RtosError> {
        kernel.resume(self.id)
    }

    pub fn resume_from_isr(&self, kernel: &mut Kernel) -> Result<IsrOutcome, RtosError> {
        kernel.resume_from_isr(self.id)
    }

    pub fn set_priority(&self, kernel: &mut Kernel, priority: u8) -> Result<(), RtosError> {
        kernel.set_priority(self.id, priority)
    }

    /// Consumes the handle. Rejected for the idle task and the timer
    /// daemon.
    pub fn delete(self, kernel: &mut Kernel) -> Result<(), RtosError> {
        kernel.delete_task(self.id)
    }

    pub fn state(&self, kernel: &Kernel) -> Result<TaskState, RtosError> {
        kernel.task_state(self.id)
    }

    pub fn name<'k>(&self, kernel: &'k Kernel) -> Result<&'k str, RtosError> {
        kernel.task_name(self.id)
    }

    pub fn base_priority(&self, kernel: &Kernel) -> Result<u8, RtosError> {
        kernel.base_priority(self.id)
    }

    pub fn effective_priority(&self, kernel: &Kernel) -> Result<u8, RtosError> {
        kernel.effective_priority(self.id)
    }

    // Notifications target a task, so they live on the handle.

    pub fn notify(
        &self,
        kernel: &mut Kernel,
        value: u32,
        action: NotifyAction,
    ) -> Result<(), RtosError> {
        kernel.task_notify(self.id, value, action)
    }

    pub fn notify_from_isr(
        &self,
        kernel: &mut Kernel,
        value: u32,
        action: NotifyAction,
    ) -> Result<IsrOutcome, RtosError> {
        kernel.task_notify_from_isr(self.id, value, action)
    }

    pub fn notify_give(&self, kernel: &mut Kernel) -> Result<(), RtosError> {
        kernel.notify_give(self.id)
    }

    pub fn notify_give_from_isr(&self, kernel: &mut Kernel) -> Result<IsrOutcome, RtosError> {
        kernel.notify_give_from_isr(self.id)
    }

    pub fn notify_value(&self, kernel: &Kernel) -> Result<u32, RtosError> {
        kernel.notify_value(self.id)
    }
}

/// Wait for this task's notification slot; see [`Kernel::notify_wait`].
/// Free function because it always acts on the calling task.
pub fn notify_wait(
    kernel: &mut Kernel,
    clear_on_exit: bool,
    timeout: Timeout,
) -> Result<NotifyWaitOutcome, RtosError> {
    kernel.notify_wait(clear_on_exit, timeout)
}

/// Counting take on this task's notification slot; see
/// [`Kernel::notify_take`].
pub fn notify_take(
    kernel: &mut Kernel,
    clear_all: bool,
    timeout: Timeout,
) -> Result<NotifyWaitOutcome, RtosError> {
    kernel.notify_take(clear_all, timeout)
}
