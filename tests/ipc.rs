//! Inter-task communication scenarios through the typed `sync` layer.
//!
//! Each test is a small system: the harness acts as whichever task is
//! Running and reads blocked-operation results from the wake-result
//! slot, the way a port's context switch would hand them back.

use std::sync::OnceLock;

use kestrel_rtos::sync::{BinarySemaphore, EventGroup, Mutex, Queue, Receive, Timer};
use kestrel_rtos::{
    EventWaitOutcome, IsrOutcome, Kernel, QueueId, RtosError, TakeOutcome, TaskId, Timeout,
    TimerId, TimerMode, WakeResult,
};

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

fn woken_item(k: &mut Kernel, q: &Queue<u32>, task: TaskId) -> u32 {
    let result = k.take_wake_result(task).expect("no wake result");
    q.decode_wake(result).expect("wake was not a receive")
}

/// Two producers at different priorities feed one higher-priority
/// consumer. Every send is handed straight to the blocked consumer, so
/// the queue itself never fills.
#[test]
fn producer_consumer_pipeline_hands_items_straight_through() {
    let mut k = started(&[("drain", 3), ("fast", 2), ("slow", 1)]);
    let drain = k.current_task().unwrap();
    let q: Queue<u32> = Queue::new(&mut k, 4).unwrap();

    assert_eq!(
        q.receive(&mut k, Timeout::Forever).unwrap(),
        Receive::Blocked
    );
    let fast = k.current_task().unwrap();
    assert_ne!(drain, fast);

    // fast produces: the consumer preempts and gets the item directly.
    assert!(q.send(&mut k, &10, Timeout::None).is_ok());
    assert_eq!(k.current_task(), Some(drain));
    assert_eq!(woken_item(&mut k, &q, drain), 10);

    // Consumer parks again; fast goes idle; slow produces.
    assert_eq!(
        q.receive(&mut k, Timeout::Forever).unwrap(),
        Receive::Blocked
    );
    assert_eq!(k.current_task(), Some(fast));
    k.delay_for(100).unwrap();
    let slow = k.current_task().unwrap();
    assert!(q.send(&mut k, &20, Timeout::None).is_ok());
    assert_eq!(k.current_task(), Some(drain));
    assert_eq!(woken_item(&mut k, &q, drain), 20);

    // Direct handoff: nothing ever sat in the ring.
    assert_eq!(q.len(&k).unwrap(), 0);
    let _ = slow;
}

static GATE: OnceLock<QueueId> = OnceLock::new();

fn gate_timer_fires(k: &mut Kernel, timer: TimerId) {
    // Runs in the daemon task: queue the timer's payload like any other
    // client of the gatekeeper.
    let payload = k.timer_payload(timer).unwrap();
    let gate = *GATE.get().unwrap();
    let _ = k.queue_send(gate, &payload.to_le_bytes(), Timeout::None);
}

/// The gatekeeper pattern: every producer, tasks and a timer callback
/// alike, funnels through one queue owned by a single draining task, so
/// the guarded resource needs no lock.
#[test]
fn gatekeeper_serializes_tasks_and_timer_callbacks() {
    let mut k = started(&[("gatekeeper", 5), ("a", 2), ("b", 1)]);
    let gatekeeper = k.current_task().unwrap();
    let q: Queue<u32> = Queue::new(&mut k, 8).unwrap();
    GATE.set(q.id()).unwrap();

    assert_eq!(
        q.receive(&mut k, Timeout::Forever).unwrap(),
        Receive::Blocked
    );
    let a = k.current_task().unwrap();

    // a's messages are consumed one by one, gatekeeper first.
    assert!(q.send(&mut k, &1, Timeout::None).is_ok());
    assert_eq!(k.current_task(), Some(gatekeeper));
    assert_eq!(woken_item(&mut k, &q, gatekeeper), 1);
    assert_eq!(
        q.receive(&mut k, Timeout::Forever).unwrap(),
        Receive::Blocked
    );
    assert_eq!(k.current_task(), Some(a));
    assert!(q.send(&mut k, &2, Timeout::None).is_ok());
    assert_eq!(woken_item(&mut k, &q, gatekeeper), 2);
    assert_eq!(
        q.receive(&mut k, Timeout::Forever).unwrap(),
        Receive::Blocked
    );

    // a rests; b arms a timer whose callback is the third producer.
    k.delay_for(100).unwrap();
    let b = k.current_task().unwrap();
    let t = Timer::new(&mut k, "gate", 5, TimerMode::OneShot, 99, gate_timer_fires).unwrap();
    assert!(t.start(&mut k, Timeout::None).is_ok());
    assert_eq!(k.current_task(), Some(b));

    k.advance_ticks(5);
    // The callback ran in the daemon and its message reached the
    // gatekeeper like everyone else's.
    assert_eq!(k.current_task(), Some(gatekeeper));
    assert_eq!(woken_item(&mut k, &q, gatekeeper), 99);
}

/// Two equal-priority producers tick along while the drain sleeps: the
/// ring absorbs their output up to capacity, the overflow send fails
/// fast, and the drain wakes at its deadline to a full queue.
#[test]
fn periodic_producers_fill_the_queue_before_the_drain_wakes() {
    let mut k = started(&[("drain", 4), ("p1", 2), ("p2", 2)]);
    let drain = k.current_task().unwrap();
    let q: Queue<u32> = Queue::new(&mut k, 5).unwrap();

    // Drain sleeps through one reporting period.
    k.delay_for(10).unwrap();
    assert_ne!(k.current_task(), Some(drain));

    // The producers alternate via time slicing, one item per tick.
    for i in 0..5u32 {
        assert!(q.send(&mut k, &i, Timeout::None).is_ok());
        k.advance_ticks(1);
    }
    assert_eq!(q.len(&k).unwrap(), 5);
    assert!(q.is_full(&k).unwrap());
    // The ring is full and the drain is still asleep: try-once fails.
    assert_eq!(q.send(&mut k, &99, Timeout::None), Err(RtosError::Full));

    // Deadline: the drain preempts the producers and sees the backlog.
    k.advance_ticks(5);
    assert_eq!(k.current_task(), Some(drain));
    assert_eq!(k.take_wake_result(drain), Some(WakeResult::DelayElapsed));
    assert_eq!(q.len(&k).unwrap(), 5);
    for expected in 0..5u32 {
        match q.receive(&mut k, Timeout::None).unwrap() {
            Receive::Received(v) => assert_eq!(v, expected),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert!(q.is_empty(&k).unwrap());
}

/// Priority inheritance bounds inversion: while a high task waits on a
/// mutex held by a low task, a middling task cannot starve the holder.
#[test]
fn mutex_holder_outranks_middle_priority_work_until_it_gives() {
    let mut k = started(&[("high", 5), ("mid", 3), ("low", 1)]);
    let high = k.current_task().unwrap();
    let m = Mutex::new(&mut k).unwrap();

    // Park high and mid so low can take the lock.
    k.delay_for(10).unwrap();
    let mid = k.current_task().unwrap();
    k.delay_for(10).unwrap();
    let low = k.current_task().unwrap();
    assert_eq!(m.take(&mut k, Timeout::None).unwrap(), TakeOutcome::Taken);

    // Both wake; high contends on the mutex.
    k.advance_ticks(10);
    assert_eq!(k.current_task(), Some(high));
    assert_eq!(
        m.take(&mut k, Timeout::Forever).unwrap(),
        TakeOutcome::Blocked
    );

    // Low inherits high's priority: it runs ahead of ready mid.
    assert_eq!(k.current_task(), Some(low));
    assert_eq!(k.effective_priority(low).unwrap(), 5);
    assert_eq!(k.task_state(mid).unwrap(), kestrel_rtos::TaskState::Ready);

    // Give: ownership passes to high, which preempts; low drops back.
    m.give(&mut k).unwrap();
    assert_eq!(k.current_task(), Some(high));
    assert_eq!(k.take_wake_result(high), Some(WakeResult::Taken));
    assert_eq!(m.holder(&k).unwrap(), Some(high));
    assert_eq!(k.effective_priority(low).unwrap(), 1);

    // Only after high releases and blocks does mid get the core.
    m.give(&mut k).unwrap();
    k.delay_for(10).unwrap();
    assert_eq!(k.current_task(), Some(mid));
}

/// Three participants meet at a rendezvous; nobody proceeds until the
/// last arrives, and everyone observes the complete bit field.
#[test]
fn event_sync_rendezvous_releases_all_participants_together() {
    let mut k = started(&[("a", 4), ("b", 3), ("c", 2)]);
    let a = k.current_task().unwrap();
    let eg = EventGroup::new(&mut k).unwrap();
    const A: u32 = 0b001;
    const B: u32 = 0b010;
    const C: u32 = 0b100;
    const ALL: u32 = A | B | C;

    assert_eq!(
        eg.sync(&mut k, A, ALL, Timeout::Forever).unwrap(),
        EventWaitOutcome::Blocked
    );
    let b = k.current_task().unwrap();
    assert_eq!(
        eg.sync(&mut k, B, ALL, Timeout::Forever).unwrap(),
        EventWaitOutcome::Blocked
    );

    // The last arrival completes the rendezvous in place.
    match eg.sync(&mut k, C, ALL, Timeout::Forever).unwrap() {
        EventWaitOutcome::Matched(bits) => assert_eq!(bits & ALL, ALL),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(k.take_wake_result(a), Some(WakeResult::EventBitsMatched(ALL)));
    assert_eq!(k.take_wake_result(b), Some(WakeResult::EventBitsMatched(ALL)));
    // Consumed for the next round.
    assert_eq!(eg.get_bits(&k).unwrap(), 0);
}

/// Deferred interrupt handling, strategy one: the ISR gives a semaphore
/// and a dedicated high-priority worker does the processing.
#[test]
fn interrupt_defers_to_worker_through_semaphore() {
    let mut k = started(&[("worker", 6), ("main", 1)]);
    let worker = k.current_task().unwrap();
    let sem = BinarySemaphore::new(&mut k).unwrap();

    assert_eq!(
        sem.take(&mut k, Timeout::Forever).unwrap(),
        TakeOutcome::Blocked
    );
    let main = k.current_task().unwrap();

    // Interrupt arrives while main runs.
    k.isr_enter();
    let mut y = kestrel_rtos::YieldRequest::new();
    let outcome = sem.give_from_isr(&mut k).unwrap();
    assert_eq!(outcome, IsrOutcome::CompletedWokeHigherPriority);
    y.fold(outcome);
    assert_eq!(k.current_task(), Some(main));
    k.isr_exit(y);

    // The worker runs the moment the handler returns.
    assert_eq!(k.current_task(), Some(worker));
    assert_eq!(k.take_wake_result(worker), Some(WakeResult::Taken));

    // A second interrupt while the worker is already running banks the
    // token instead of waking anyone.
    k.isr_enter();
    let mut y = kestrel_rtos::YieldRequest::new();
    let outcome = sem.give_from_isr(&mut k).unwrap();
    assert_eq!(outcome, IsrOutcome::Completed);
    y.fold(outcome);
    k.isr_exit(y);
    assert_eq!(
        sem.take(&mut k, Timeout::None).unwrap(),
        TakeOutcome::Taken
    );
}

/// Deferred interrupt handling, strategy two: the ISR pends the work to
/// the timer daemon, here an event-group set that releases a waiter.
#[test]
fn interrupt_defers_to_daemon_through_pended_call() {
    let mut k = started(&[("waiter", 3), ("main", 1)]);
    let waiter = k.current_task().unwrap();
    let eg = EventGroup::new(&mut k).unwrap();

    assert_eq!(
        eg.wait_bits(&mut k, 0b1, true, false, Timeout::Forever)
            .unwrap(),
        EventWaitOutcome::Blocked
    );
    let main = k.current_task().unwrap();

    k.isr_enter();
    let mut y = kestrel_rtos::YieldRequest::new();
    // The set cannot run here; it is queued for the daemon, and the
    // daemon outranks everything.
    let outcome = eg.set_bits_from_isr(&mut k, 0b1).unwrap();
    assert_eq!(outcome, IsrOutcome::CompletedWokeHigherPriority);
    y.fold(outcome);
    assert_eq!(k.current_task(), Some(main));
    k.isr_exit(y);

    // Daemon ran the deferred set and went back to sleep; the released
    // waiter is now the highest ready task.
    assert_eq!(k.current_task(), Some(waiter));
    assert_eq!(
        k.take_wake_result(waiter),
        Some(WakeResult::EventBitsMatched(0b1))
    );
    assert_eq!(eg.get_bits(&k).unwrap(), 0);
}

fn toggle(k: &mut Kernel, timer: TimerId) {
    let state = k.timer_payload(timer).unwrap();
    k.set_timer_payload(timer, state ^ 1).unwrap();
}

/// An auto-reload timer drives a periodic toggle without any task
/// involvement beyond arming it.
#[test]
fn auto_reload_timer_toggles_on_every_period() {
    let mut k = started(&[("main", 2)]);
    let blink = Timer::new(&mut k, "blink", 10, TimerMode::AutoReload, 0, toggle).unwrap();
    assert!(blink.start(&mut k, Timeout::None).is_ok());
    assert!(blink.is_active(&k).unwrap());

    for expected in [1u32, 0, 1, 0] {
        k.advance_ticks(10);
        assert_eq!(blink.payload(&k).unwrap(), expected);
    }

    assert!(blink.stop(&mut k, Timeout::None).is_ok());
    k.advance_ticks(30);
    assert_eq!(blink.payload(&k).unwrap(), 0);
}
