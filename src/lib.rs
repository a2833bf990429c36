//! A single-core, priority-driven real-time kernel.
//!
//! The kernel is an explicit value — [`kernel::Kernel`] — holding every
//! scheduler table and kernel object in fixed-capacity pools, with no
//! heap and no ambient global state. Tasks are preemptively scheduled by
//! effective priority with round-robin time slicing among equals; the
//! blocking primitives are queues, counting and binary semaphores,
//! priority-inheriting mutexes, event groups, software timers and
//! per-task notification slots.
//!
//! Interrupt handlers interact with the kernel through the `*_from_isr`
//! operations inside a [`Kernel::isr_enter`] / [`Kernel::isr_exit`]
//! bracket, folding each [`types::IsrOutcome`] into a
//! [`types::YieldRequest`] so the deferred context switch happens once,
//! at interrupt exit.
//!
//! The core is a deterministic state machine: blocking operations return
//! a `Blocked` outcome once the caller has been switched out, and the
//! final result of the wait is delivered through the task's wake-result
//! slot ([`Kernel::take_wake_result`]) when it runs again. Executing
//! task bodies and taking interrupts is the port layer's job; on a bare
//! target that is a tick interrupt plus context save/restore, on a host
//! it is a test harness driving the kernel directly.
//!
//! [`Kernel::isr_enter`]: kernel::Kernel::isr_enter
//! [`Kernel::isr_exit`]: kernel::Kernel::isr_exit
//! [`Kernel::take_wake_result`]: kernel::Kernel::take_wake_result

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod kernel;
pub mod port;
pub mod sync;
pub mod types;

pub(crate) mod trace;

pub use kernel::{Kernel, PendedFunction, TimerCallback};
pub use types::{
    EventBits, EventGroupId, EventWaitOutcome, IsrOutcome, MutexId, NotifyAction,
    NotifyWaitOutcome, QueueId, RawItem, ReceiveOutcome, RtosError, SemaphoreId, SendOutcome,
    TakeOutcome, TaskFn, TaskId, TaskState, Tick, Timeout, TimerId, TimerMode, WakeResult,
    YieldRequest,
};
