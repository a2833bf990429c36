//! Scheduler behavior, driven through the public API.
//!
//! The harness acts as whichever task is Running: it issues that task's
//! kernel calls and reads blocked-operation results from the task's
//! wake-result slot. Task entry functions are never executed.

use kestrel_rtos::{Kernel, RtosError, TaskState, WakeResult};

fn task_body(_arg: usize) -> ! {
    unreachable!("task bodies are not executed by the test harness")
}

fn started(tasks: &[(&str, u8)]) -> Kernel {
    let mut kernel = Kernel::new();
    for &(name, priority) in tasks {
        kernel.create_task(name, task_body, priority, 0).unwrap();
    }
    kernel.start().unwrap();
    kernel
}

#[test]
fn dispatch_is_priority_first_then_fifo_among_equals() {
    let mut k = started(&[("low", 1), ("a", 3), ("b", 3)]);
    let a = k.current_task().unwrap();
    assert_eq!(k.task_name(a).unwrap(), "a");
    // Yield rotates within the priority level, never down to "low".
    k.yield_now().unwrap();
    let b = k.current_task().unwrap();
    assert_eq!(k.task_name(b).unwrap(), "b");
    k.yield_now().unwrap();
    assert_eq!(k.current_task(), Some(a));
}

#[test]
fn tick_time_slices_equal_priorities() {
    let mut k = started(&[("a", 2), ("b", 2), ("low", 1)]);
    let a = k.current_task().unwrap();
    k.advance_ticks(1);
    let b = k.current_task().unwrap();
    assert_ne!(a, b);
    k.advance_ticks(1);
    assert_eq!(k.current_task(), Some(a));
    // "low" never ran.
    assert_eq!(k.task_name(a).unwrap(), "a");
    assert_eq!(k.task_name(b).unwrap(), "b");
}

#[test]
fn delayed_task_wakes_on_time_and_preempts_lower() {
    let mut k = started(&[("hi", 3), ("lo", 1)]);
    let hi = k.current_task().unwrap();
    k.delay_for(5).unwrap();
    let lo = k.current_task().unwrap();
    assert_ne!(hi, lo);
    k.advance_ticks(4);
    assert_eq!(k.current_task(), Some(lo));
    k.advance_ticks(1);
    assert_eq!(k.current_task(), Some(hi));
    assert_eq!(k.take_wake_result(hi), Some(WakeResult::DelayElapsed));
}

#[test]
fn delay_until_does_not_drift_while_delay_for_does() {
    let mut k = started(&[("periodic", 3), ("lo", 1)]);
    let periodic = k.current_task().unwrap();
    let mut last_wake = k.now();

    // Three periods of 10 ticks with 3 ticks of "work" each: wakes land
    // exactly on the period grid.
    for cycle in 1..=3u64 {
        k.advance_ticks(3); // work while running
        assert_eq!(k.current_task(), Some(periodic));
        assert!(k.delay_until(&mut last_wake, 10).unwrap());
        k.advance_ticks(10 - 3);
        assert_eq!(k.current_task(), Some(periodic));
        assert_eq!(k.now(), cycle * 10);
    }

    // The same shape with delay_for accumulates the work time.
    let mut k = started(&[("periodic", 3), ("lo", 1)]);
    let periodic = k.current_task().unwrap();
    for _ in 0..3 {
        k.advance_ticks(3);
        k.delay_for(10).unwrap();
        k.advance_ticks(10);
        assert_eq!(k.current_task(), Some(periodic));
    }
    // 3 cycles of 3 + 10 ticks: wakes drifted to the 13-tick grid.
    assert_eq!(k.now(), 39);
}

#[test]
fn delay_until_reports_a_missed_period() {
    let mut k = started(&[("periodic", 3), ("lo", 1)]);
    let mut last_wake = k.now();
    // Overrun: 12 ticks of work against a 10-tick period.
    k.advance_ticks(12);
    // The wake point is already past; the task keeps running and is told
    // the deadline slipped.
    assert!(!k.delay_until(&mut last_wake, 10).unwrap());
    assert_eq!(last_wake, 10);
}

#[test]
fn suspended_task_is_skipped_until_resumed() {
    let mut k = started(&[("hi", 3), ("lo", 1)]);
    let hi = k.current_task().unwrap();
    k.suspend(hi).unwrap();
    let lo = k.current_task().unwrap();
    assert_eq!(k.task_state(hi).unwrap(), TaskState::Suspended);
    // Ticks do not wake a suspended task.
    k.advance_ticks(100);
    assert_eq!(k.current_task(), Some(lo));
    k.resume(hi).unwrap();
    assert_eq!(k.current_task(), Some(hi));
}

#[test]
fn raising_a_ready_tasks_priority_preempts_the_runner() {
    let mut k = Kernel::new();
    let a = k.create_task("a", task_body, 3, 0).unwrap();
    let b = k.create_task("b", task_body, 2, 0).unwrap();
    k.start().unwrap();
    assert_eq!(k.current_task(), Some(a));
    k.set_priority(b, 4).unwrap();
    assert_eq!(k.current_task(), Some(b));
    assert_eq!(k.effective_priority(b).unwrap(), 4);
}

#[test]
fn idle_task_runs_when_everything_blocks() {
    let mut k = started(&[("only", 2)]);
    let only = k.current_task().unwrap();
    k.delay_for(50).unwrap();
    let idle = k.current_task().unwrap();
    assert_ne!(idle, only);
    assert_eq!(k.effective_priority(idle).unwrap(), 0);
    k.advance_ticks(50);
    assert_eq!(k.current_task(), Some(only));
}

#[test]
fn blocking_calls_are_rejected_inside_an_interrupt() {
    let mut k = started(&[("t", 2)]);
    k.with_isr::<RtosError>(|k, _y| {
        assert_eq!(k.delay_for(5), Err(RtosError::InvalidOperation));
        assert_eq!(k.yield_now(), Err(RtosError::InvalidOperation));
        Ok(())
    })
    .unwrap();
    // Back in task context the same call works.
    k.delay_for(5).unwrap();
}
