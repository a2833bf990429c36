//! Kernel configuration.
//!
//! Everything the kernel sizes at compile time lives here: pool capacities,
//! the number of priority levels, tick rate and timer-service settings.
//! All pools are fixed-size; creation calls fail with
//! [`RtosError::ResourceExhausted`](crate::types::RtosError::ResourceExhausted)
//! once a pool is empty.

use crate::types::Tick;

// =============================================================================
// Task configuration
// =============================================================================

/// Maximum number of tasks, including the idle task and the timer daemon.
pub const MAX_TASKS: usize = 16;

/// Number of distinct priority levels. Valid priorities are
/// `0..MAX_PRIORITIES`, with 0 the lowest (reserved for the idle task)
/// and `MAX_PRIORITIES - 1` the highest.
pub const MAX_PRIORITIES: usize = 8;

/// Priority of the idle task.
pub const IDLE_PRIORITY: u8 = 0;

/// Maximum length of a task or timer name, in characters.
pub const MAX_NAME_LEN: usize = 16;

// =============================================================================
// Queue configuration
// =============================================================================

/// Maximum number of queue objects. Semaphores and mutexes are queue
/// objects too and draw from the same pool.
pub const MAX_QUEUES: usize = 12;

/// Storage reserved per queue, in bytes. A queue of `capacity` items of
/// `item_size` bytes each needs `capacity * item_size` of it.
pub const QUEUE_STORAGE_BYTES: usize = 512;

/// Largest item a queue may carry, in bytes.
pub const MAX_ITEM_SIZE: usize = 64;

// =============================================================================
// Event group configuration
// =============================================================================

/// Maximum number of event groups.
pub const MAX_EVENT_GROUPS: usize = 4;

// =============================================================================
// Timer service configuration
// =============================================================================

/// Maximum number of software timers.
pub const MAX_TIMERS: usize = 8;

/// Depth of the timer daemon's command queue. A full queue makes timer
/// commands block or time out, and makes the `*_from_isr` variants fail.
pub const TIMER_QUEUE_DEPTH: usize = 8;

/// Priority of the timer daemon task. Kept at the highest level so timer
/// callbacks and deferred interrupt work run ahead of application tasks.
pub const TIMER_TASK_PRIORITY: u8 = (MAX_PRIORITIES - 1) as u8;

// =============================================================================
// Tick configuration
// =============================================================================

/// Tick rate of the external tick source, in Hz. Only used to convert
/// milliseconds to ticks; the kernel itself counts ticks.
pub const TICK_RATE_HZ: Tick = 1000;

/// Convert milliseconds to ticks at [`TICK_RATE_HZ`].
pub const fn ms_to_ticks(ms: u64) -> Tick {
    ms * TICK_RATE_HZ / 1000
}
