//! Typed, ergonomic handles over the kernel primitives.
//!
//! The kernel API in [`crate::kernel`] moves raw bytes and raw ids.
//! These wrappers pin a queue to one `Copy` item type, keep semaphore
//! and mutex handles from being mixed up, and read the way application
//! code wants to read. They add no state of their own: each is a handle
//! plus the `&mut Kernel` threading.

pub mod event_group;
pub mod mutex;
pub mod queue;
pub mod semaphore;
pub mod task;
pub mod timer;

pub use event_group::EventGroup;
pub use mutex::Mutex;
pub use queue::{Queue, Receive};
pub use semaphore::{BinarySemaphore, CountingSemaphore};
pub use task::Task;
pub use timer::Timer;
