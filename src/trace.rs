//! Scheduler trace points, routed through the `log` facade.
//!
//! Every scheduling decision of interest funnels through one of these
//! functions. With no logger installed they compile down to nothing; on
//! a host build, wiring up `env_logger` (or any `log` backend) in a test
//! or demo makes the kernel narrate context switches, blocks and wakes
//! at `trace` level and lifecycle events at `debug` level.

use crate::types::{EventBits, QueueId, TaskId, Tick, TimerId};

pub(crate) fn scheduler_started() {
    log::debug!("scheduler started");
}

pub(crate) fn switched_in(prev: Option<TaskId>, next: TaskId) {
    log::trace!("switch {prev:?} -> {next:?}");
}

pub(crate) fn task_created(task: TaskId, name: &str, priority: u8) {
    log::debug!("task {task:?} {name:?} created at priority {priority}");
}

pub(crate) fn task_deleted(task: TaskId) {
    log::debug!("task {task:?} deleted");
}

pub(crate) fn task_suspended(task: TaskId) {
    log::trace!("task {task:?} suspended");
}

pub(crate) fn task_resumed(task: TaskId) {
    log::trace!("task {task:?} resumed");
}

pub(crate) fn task_blocked(task: TaskId) {
    log::trace!("task {task:?} blocked");
}

pub(crate) fn task_readied(task: TaskId) {
    log::trace!("task {task:?} readied");
}

pub(crate) fn priority_changed(task: TaskId, old: u8, new: u8) {
    log::trace!("task {task:?} priority {old} -> {new}");
}

pub(crate) fn priority_inherited(holder: TaskId, boosted_to: u8) {
    log::trace!("task {holder:?} inherits priority {boosted_to}");
}

pub(crate) fn priority_disinherited(holder: TaskId, restored_to: u8) {
    log::trace!("task {holder:?} disinherits to priority {restored_to}");
}

pub(crate) fn queue_created(queue: QueueId) {
    log::debug!("queue {queue:?} created");
}

pub(crate) fn event_bits_set(
    group: crate::types::EventGroupId,
    mask: EventBits,
    bits: EventBits,
) {
    log::trace!("event group {group:?} set {mask:#x}, now {bits:#x}");
}

pub(crate) fn timer_armed(timer: TimerId, expiry: Tick) {
    log::trace!("timer {timer:?} armed for tick {expiry}");
}

pub(crate) fn timer_expired(timer: TimerId) {
    log::trace!("timer {timer:?} expired");
}
