//! Fixed-capacity blocking queues.
//!
//! Items are queued by copy into a byte ring. A send on a full queue and
//! a receive on an empty queue block the caller (or fail immediately for
//! the try-once and ISR forms); blocked tasks wait in priority-then-
//! arrival order and the kernel completes their operation on their behalf
//! when the queue state changes. Semaphores and mutexes are queues of
//! item size zero and share all of this machinery (see
//! [`super::semaphore`]).

use crate::config::{MAX_ITEM_SIZE, QUEUE_STORAGE_BYTES};
use crate::trace;
use crate::types::{
    IsrOutcome, QueueId, RawItem, ReceiveOutcome, RtosError, SendOutcome, TaskId, Timeout,
    WakeResult,
};

use super::list::WaitList;
use super::tasks::{BlockedOn, PendingSend};
use super::Kernel;

// =============================================================================
// Queue object
// =============================================================================

/// What a queue slot is used as. Semaphores and mutexes reuse the queue
/// pool; their token count is the queue's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueKind {
    Queue,
    BinarySemaphore,
    CountingSemaphore,
    Mutex { recursive: bool },
}

pub(crate) struct Queue {
    pub kind: QueueKind,
    pub capacity: usize,
    pub item_size: usize,
    storage: [u8; QUEUE_STORAGE_BYTES],
    /// Item index of the front of the ring.
    head: usize,
    /// Occupancy: items for a queue, tokens for a semaphore.
    pub count: usize,
    /// Tasks blocked sending into a full queue.
    pub senders: WaitList,
    /// Tasks blocked receiving/taking from an empty queue or semaphore.
    pub receivers: WaitList,
    /// Mutex only: the task holding the lock.
    pub holder: Option<TaskId>,
    /// Recursive mutex only: nested take depth beyond the first.
    pub recursion: usize,
}

impl Queue {
    pub(crate) fn new(kind: QueueKind, capacity: usize, item_size: usize, count: usize) -> Self {
        Queue {
            kind,
            capacity,
            item_size,
            storage: [0; QUEUE_STORAGE_BYTES],
            head: 0,
            count,
            senders: WaitList::new(),
            receivers: WaitList::new(),
            holder: None,
            recursion: 0,
        }
    }

    fn byte_range(&self, item_index: usize) -> core::ops::Range<usize> {
        let start = item_index * self.item_size;
        start..start + self.item_size
    }

    pub(crate) fn push_back_item(&mut self, bytes: &[u8]) {
        let slot = (self.head + self.count) % self.capacity;
        let range = self.byte_range(slot);
        self.storage[range].copy_from_slice(bytes);
        self.count += 1;
    }

    pub(crate) fn push_front_item(&mut self, bytes: &[u8]) {
        self.head = (self.head + self.capacity - 1) % self.capacity;
        let range = self.byte_range(self.head);
        self.storage[range].copy_from_slice(bytes);
        self.count += 1;
    }

    pub(crate) fn pop_front_item(&mut self) -> RawItem {
        let item = self.peek_front_item();
        self.head = (self.head + 1) % self.capacity;
        self.count -= 1;
        item
    }

    pub(crate) fn peek_front_item(&self) -> RawItem {
        let mut item = RawItem::new();
        let _ = item.extend_from_slice(&self.storage[self.byte_range(self.head)]);
        item
    }
}

// =============================================================================
// Kernel queue operations
// =============================================================================

impl Kernel {
    /// Create a queue of `capacity` items of `item_size` bytes each.
    ///
    /// `InvalidArgument` for a zero capacity, an item size above
    /// [`MAX_ITEM_SIZE`] or storage above [`QUEUE_STORAGE_BYTES`];
    /// `ResourceExhausted` when the queue pool is empty.
    pub fn create_queue(&mut self, capacity: usize, item_size: usize) -> Result<QueueId, RtosError> {
        let storage = capacity
            .checked_mul(item_size)
            .ok_or(RtosError::InvalidArgument)?;
        if capacity == 0 || item_size > MAX_ITEM_SIZE || storage > QUEUE_STORAGE_BYTES {
            return Err(RtosError::InvalidArgument);
        }
        self.create_queue_raw(QueueKind::Queue, capacity, item_size, 0)
    }

    pub(crate) fn create_queue_raw(
        &mut self,
        kind: QueueKind,
        capacity: usize,
        item_size: usize,
        count: usize,
    ) -> Result<QueueId, RtosError> {
        let id = QueueId(self.queues.alloc(Queue::new(kind, capacity, item_size, count))?);
        trace::queue_created(id);
        Ok(id)
    }

    /// Delete a queue. Rejected while any task is blocked on it, or
    /// while it is a mutex someone holds.
    pub fn delete_queue(&mut self, queue: QueueId) -> Result<(), RtosError> {
        let q = self.queue_ref(queue)?;
        if !q.senders.is_empty() || !q.receivers.is_empty() || q.holder.is_some() {
            return Err(RtosError::InvalidOperation);
        }
        self.queues.free(queue.0);
        Ok(())
    }

    /// Send `item` to the back of the queue.
    ///
    /// Succeeds immediately when there is room, waking the
    /// highest-priority longest-waiting receiver (which preempts the
    /// caller if it outranks it). On a full queue: `Full` for the
    /// try-once forms, otherwise the caller blocks; `Blocked` means the
    /// outcome arrives through the wake-result slot, `TimedOut` if the
    /// deadline elapses first.
    pub fn queue_send(
        &mut self,
        queue: QueueId,
        item: &[u8],
        timeout: Timeout,
    ) -> Result<SendOutcome, RtosError> {
        self.generic_send(queue, item, timeout, false)
    }

    /// Send bypassing FIFO order: the item is received before anything
    /// already queued. Used by high-priority alert paths.
    pub fn queue_send_to_front(
        &mut self,
        queue: QueueId,
        item: &[u8],
        timeout: Timeout,
    ) -> Result<SendOutcome, RtosError> {
        self.generic_send(queue, item, timeout, true)
    }

    fn generic_send(
        &mut self,
        queue: QueueId,
        item: &[u8],
        timeout: Timeout,
        to_front: bool,
    ) -> Result<SendOutcome, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        self.check_plain_queue(queue)?;
        self.check_item_len(queue, item)?;
        if self.try_deliver(queue, item, to_front)? {
            return Ok(SendOutcome::Sent);
        }
        if timeout.is_immediate() {
            return Err(RtosError::Full);
        }
        let deadline = self.resolve_deadline(timeout);
        let cur = self.current.ok_or(RtosError::InvalidOperation)?;
        let prio = self.effective_priority(cur)?;
        {
            let mut bytes = RawItem::new();
            let _ = bytes.extend_from_slice(item);
            self.tcb_mut(cur)?.pending_send = Some(PendingSend { bytes, to_front });
        }
        if let Some(q) = self.queues.get_mut(queue.0) {
            q.senders.insert(cur, prio);
        }
        self.block_current(BlockedOn::QueueSend(queue), deadline)?;
        Ok(SendOutcome::Blocked)
    }

    /// Receive the front item.
    ///
    /// On an empty queue: `Empty` for the try-once forms, otherwise the
    /// caller blocks and the item is delivered through its wake-result
    /// slot. Receiving frees a slot and completes the highest-priority
    /// blocked send, if any.
    pub fn queue_receive(
        &mut self,
        queue: QueueId,
        timeout: Timeout,
    ) -> Result<ReceiveOutcome, RtosError> {
        self.generic_receive(queue, timeout, false)
    }

    /// Copy the front item without removing it. Does not free a slot,
    /// so blocked senders stay blocked.
    pub fn queue_peek(
        &mut self,
        queue: QueueId,
        timeout: Timeout,
    ) -> Result<ReceiveOutcome, RtosError> {
        self.generic_receive(queue, timeout, true)
    }

    fn generic_receive(
        &mut self,
        queue: QueueId,
        timeout: Timeout,
        peek: bool,
    ) -> Result<ReceiveOutcome, RtosError> {
        if self.in_isr {
            return Err(RtosError::InvalidOperation);
        }
        self.check_plain_queue(queue)?;
        let available = self.queue_ref(queue)?.count > 0;
        if available {
            let item = {
                let q = match self.queues.get_mut(queue.0) {
                    Some(q) => q,
                    None => return Err(RtosError::InvalidHandle),
                };
                if peek {
                    q.peek_front_item()
                } else {
                    q.pop_front_item()
                }
            };
            if !peek {
                self.service_senders(queue);
            }
            return Ok(ReceiveOutcome::Received(item));
        }
        if timeout.is_immediate() {
            return Err(RtosError::Empty);
        }
        let deadline = self.resolve_deadline(timeout);
        let cur = self.current.ok_or(RtosError::InvalidOperation)?;
        let prio = self.effective_priority(cur)?;
        if let Some(q) = self.queues.get_mut(queue.0) {
            q.receivers.insert(cur, prio);
        }
        let on = if peek {
            BlockedOn::QueuePeek(queue)
        } else {
            BlockedOn::QueueReceive(queue)
        };
        self.block_current(on, deadline)?;
        Ok(ReceiveOutcome::Blocked)
    }

    // =========================================================================
    // ISR-safe variants
    // =========================================================================

    /// ISR-safe send: never blocks. `Full` when there is no room; on
    /// success the outcome reports whether a higher-priority receiver
    /// was readied, to be folded into the handler's `YieldRequest`.
    pub fn queue_send_from_isr(
        &mut self,
        queue: QueueId,
        item: &[u8],
    ) -> Result<IsrOutcome, RtosError> {
        self.send_from_isr_inner(queue, item, false)
    }

    /// ISR-safe [`Kernel::queue_send_to_front`].
    pub fn queue_send_to_front_from_isr(
        &mut self,
        queue: QueueId,
        item: &[u8],
    ) -> Result<IsrOutcome, RtosError> {
        self.send_from_isr_inner(queue, item, true)
    }

    fn send_from_isr_inner(
        &mut self,
        queue: QueueId,
        item: &[u8],
        to_front: bool,
    ) -> Result<IsrOutcome, RtosError> {
        self.check_plain_queue(queue)?;
        self.check_item_len(queue, item)?;
        let prev = self.in_isr;
        self.in_isr = true;
        let result = self.try_deliver_tracked(queue, item, to_front);
        self.in_isr = prev;
        match result? {
            Some(woke_higher) => Ok(Kernel::isr_outcome(woke_higher)),
            None => Err(RtosError::Full),
        }
    }

    /// ISR-safe receive: never blocks. `Empty` when nothing is queued;
    /// on success returns the item and the fold-able outcome.
    pub fn queue_receive_from_isr(
        &mut self,
        queue: QueueId,
    ) -> Result<(RawItem, IsrOutcome), RtosError> {
        self.check_plain_queue(queue)?;
        let prev = self.in_isr;
        self.in_isr = true;
        let result = (|| {
            let q = self.queues.get_mut(queue.0).ok_or(RtosError::InvalidHandle)?;
            if q.count == 0 {
                return Err(RtosError::Empty);
            }
            let item = q.pop_front_item();
            let woke_higher = self.service_senders(queue);
            Ok((item, Kernel::isr_outcome(woke_higher)))
        })();
        self.in_isr = prev;
        result
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Items currently queued.
    pub fn queue_len(&self, queue: QueueId) -> Result<usize, RtosError> {
        self.queue_ref(queue).map(|q| q.count)
    }

    /// Free item slots.
    pub fn queue_spaces(&self, queue: QueueId) -> Result<usize, RtosError> {
        self.queue_ref(queue).map(|q| q.capacity - q.count)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    pub(crate) fn queue_ref(&self, queue: QueueId) -> Result<&Queue, RtosError> {
        self.queues.get(queue.0).ok_or(RtosError::InvalidHandle)
    }

    fn check_plain_queue(&self, queue: QueueId) -> Result<(), RtosError> {
        if self.queue_ref(queue)?.kind != QueueKind::Queue {
            return Err(RtosError::InvalidOperation);
        }
        Ok(())
    }

    fn check_item_len(&self, queue: QueueId, item: &[u8]) -> Result<(), RtosError> {
        if item.len() != self.queue_ref(queue)?.item_size {
            return Err(RtosError::InvalidArgument);
        }
        Ok(())
    }

    /// Place the item if there is room and wake a waiting receiver.
    /// Returns whether the item was placed.
    fn try_deliver(&mut self, queue: QueueId, item: &[u8], to_front: bool) -> Result<bool, RtosError> {
        self.try_deliver_tracked(queue, item, to_front)
            .map(|placed| placed.is_some())
    }

    /// Like [`Kernel::try_deliver`] but reports whether a woken receiver
    /// outranks the running task (`Some(woke_higher)` when placed).
    fn try_deliver_tracked(
        &mut self,
        queue: QueueId,
        item: &[u8],
        to_front: bool,
    ) -> Result<Option<bool>, RtosError> {
        {
            let q = self.queues.get_mut(queue.0).ok_or(RtosError::InvalidHandle)?;
            if q.count >= q.capacity {
                return Ok(None);
            }
            if to_front {
                q.push_front_item(item);
            } else {
                q.push_back_item(item);
            }
        }
        let woke_higher = self.service_receivers(queue);
        Ok(Some(woke_higher))
    }

    /// Complete blocked receives while items are available. Peek waiters
    /// are satisfied without consuming, so several can complete off one
    /// item. Returns whether any woken task outranks the running one.
    pub(crate) fn service_receivers(&mut self, queue: QueueId) -> bool {
        let mut woke_higher = false;
        loop {
            let rx = {
                let q = match self.queues.get_mut(queue.0) {
                    Some(q) => q,
                    None => break,
                };
                if q.count == 0 {
                    break;
                }
                match q.receivers.pop_front() {
                    Some(rx) => rx,
                    None => break,
                }
            };
            let peek = matches!(
                self.tcb(rx).map(|t| t.block),
                Ok(Some(BlockedOn::QueuePeek(_)))
            );
            let item = {
                let q = match self.queues.get_mut(queue.0) {
                    Some(q) => q,
                    None => break,
                };
                if peek {
                    q.peek_front_item()
                } else {
                    q.pop_front_item()
                }
            };
            woke_higher |= self.unblock(rx, WakeResult::Received(item));
        }
        woke_higher
    }

    /// Complete blocked sends while slots are free, copying each stashed
    /// item into the ring on the sender's behalf.
    pub(crate) fn service_senders(&mut self, queue: QueueId) -> bool {
        let mut woke_higher = false;
        loop {
            let tx = {
                let q = match self.queues.get_mut(queue.0) {
                    Some(q) => q,
                    None => break,
                };
                if q.count >= q.capacity {
                    break;
                }
                match q.senders.pop_front() {
                    Some(tx) => tx,
                    None => break,
                }
            };
            let pending = self.tcb_mut(tx).ok().and_then(|t| t.pending_send.take());
            if let Some(PendingSend { bytes, to_front }) = pending {
                if let Some(q) = self.queues.get_mut(queue.0) {
                    if to_front {
                        q.push_front_item(&bytes);
                    } else {
                        q.push_back_item(&bytes);
                    }
                }
                woke_higher |= self.unblock(tx, WakeResult::Sent);
            }
        }
        woke_higher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{never_runs, started_kernel};
    use crate::types::YieldRequest;

    fn item(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    fn value(raw: &RawItem) -> u32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(raw);
        u32::from_le_bytes(b)
    }

    #[test]
    fn full_queue_rejects_try_once_send_until_a_receive() {
        let mut k = started_kernel(&[("t", 2)]);
        let q = k.create_queue(5, 4).unwrap();
        for i in 0..5 {
            assert_eq!(
                k.queue_send(q, &item(i), Timeout::None).unwrap(),
                SendOutcome::Sent
            );
        }
        assert_eq!(k.queue_len(q).unwrap(), 5);
        assert_eq!(
            k.queue_send(q, &item(5), Timeout::None),
            Err(RtosError::Full)
        );
        match k.queue_receive(q, Timeout::None).unwrap() {
            ReceiveOutcome::Received(raw) => assert_eq!(value(&raw), 0),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            k.queue_send(q, &item(5), Timeout::None).unwrap(),
            SendOutcome::Sent
        );
    }

    #[test]
    fn ring_preserves_fifo_order_across_wraparound() {
        let mut k = started_kernel(&[("t", 2)]);
        let q = k.create_queue(3, 4).unwrap();
        for i in 0..3 {
            let _ = k.queue_send(q, &item(i), Timeout::None).unwrap();
        }
        // Drain two, refill two: the write index wraps past the end.
        for expected in [0, 1] {
            match k.queue_receive(q, Timeout::None).unwrap() {
                ReceiveOutcome::Received(raw) => assert_eq!(value(&raw), expected),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        let _ = k.queue_send(q, &item(3), Timeout::None).unwrap();
        let _ = k.queue_send(q, &item(4), Timeout::None).unwrap();
        for expected in [2, 3, 4] {
            match k.queue_receive(q, Timeout::None).unwrap() {
                ReceiveOutcome::Received(raw) => assert_eq!(value(&raw), expected),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }

    #[test]
    fn create_queue_rejects_dimension_overflow() {
        let mut k = started_kernel(&[("t", 2)]);
        assert_eq!(
            k.create_queue(usize::MAX, 4),
            Err(RtosError::InvalidArgument)
        );
    }

    #[test]
    fn send_to_front_is_received_first() {
        let mut k = started_kernel(&[("t", 2)]);
        let q = k.create_queue(4, 4).unwrap();
        let _ = k.queue_send(q, &item(1), Timeout::None).unwrap();
        let _ = k.queue_send(q, &item(2), Timeout::None).unwrap();
        let _ = k.queue_send_to_front(q, &item(9), Timeout::None).unwrap();
        match k.queue_receive(q, Timeout::None).unwrap() {
            ReceiveOutcome::Received(raw) => assert_eq!(value(&raw), 9),
            other => panic!("unexpected outcome {other:?}"),
        }
        match k.queue_receive(q, Timeout::None).unwrap() {
            ReceiveOutcome::Received(raw) => assert_eq!(value(&raw), 1),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn blocked_receiver_is_woken_by_send_and_preempts() {
        let mut k = started_kernel(&[("rx", 3), ("tx", 1)]);
        let rx = k.current_task().unwrap();
        let q = k.create_queue(2, 4).unwrap();
        // High-priority receiver blocks on the empty queue.
        assert_eq!(
            k.queue_receive(q, Timeout::Forever).unwrap(),
            ReceiveOutcome::Blocked
        );
        let tx = k.current_task().unwrap();
        assert_ne!(rx, tx);
        // Low-priority sender delivers: the receiver preempts it at once.
        assert_eq!(
            k.queue_send(q, &item(7), Timeout::None).unwrap(),
            SendOutcome::Sent
        );
        assert_eq!(k.current_task(), Some(rx));
        match k.take_wake_result(rx) {
            Some(WakeResult::Received(raw)) => assert_eq!(value(&raw), 7),
            other => panic!("unexpected wake {other:?}"),
        }
        // The item went straight to the receiver.
        assert_eq!(k.queue_len(q).unwrap(), 0);
    }

    #[test]
    fn blocked_sender_completes_when_space_frees() {
        let mut k = started_kernel(&[("tx", 3), ("rx", 1)]);
        let tx = k.current_task().unwrap();
        let q = k.create_queue(1, 4).unwrap();
        let _ = k.queue_send(q, &item(1), Timeout::None).unwrap();
        // Queue full: the sender blocks.
        assert_eq!(
            k.queue_send(q, &item(2), Timeout::Ticks(50)).unwrap(),
            SendOutcome::Blocked
        );
        let rx = k.current_task().unwrap();
        assert_ne!(tx, rx);
        // Receive frees the slot; the kernel completes the stalled send.
        match k.queue_receive(q, Timeout::None).unwrap() {
            ReceiveOutcome::Received(raw) => assert_eq!(value(&raw), 1),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(k.current_task(), Some(tx));
        assert_eq!(k.take_wake_result(tx), Some(WakeResult::Sent));
        assert_eq!(k.queue_len(q).unwrap(), 1);
    }

    #[test]
    fn blocked_send_times_out_on_a_full_queue() {
        let mut k = started_kernel(&[("tx", 3), ("bg", 1)]);
        let tx = k.current_task().unwrap();
        let q = k.create_queue(1, 4).unwrap();
        let _ = k.queue_send(q, &item(1), Timeout::None).unwrap();
        assert_eq!(
            k.queue_send(q, &item(2), Timeout::Ticks(3)).unwrap(),
            SendOutcome::Blocked
        );
        k.advance_ticks(3);
        assert_eq!(k.current_task(), Some(tx));
        assert_eq!(k.take_wake_result(tx), Some(WakeResult::TimedOut(None)));
        assert_eq!(k.queue_len(q).unwrap(), 1);
    }

    #[test]
    fn receivers_are_woken_in_priority_then_arrival_order() {
        let mut k = started_kernel(&[("a", 2), ("b", 2), ("c", 4)]);
        let c = k.current_task().unwrap();
        let q = k.create_queue(4, 4).unwrap();
        // c (prio 4) blocks first, then a and b (prio 2).
        assert_eq!(
            k.queue_receive(q, Timeout::Forever).unwrap(),
            ReceiveOutcome::Blocked
        );
        let a = k.current_task().unwrap();
        assert_eq!(
            k.queue_receive(q, Timeout::Forever).unwrap(),
            ReceiveOutcome::Blocked
        );
        let b = k.current_task().unwrap();
        // b sends one item: c is the highest waiter and must be the one woken.
        let _ = k.queue_send(q, &item(1), Timeout::None).unwrap();
        assert_eq!(k.current_task(), Some(c));
        assert!(matches!(
            k.take_wake_result(c),
            Some(WakeResult::Received(_))
        ));
        // a is still blocked.
        assert_eq!(k.take_wake_result(a), None);
        let _ = b;
    }

    #[test]
    fn isr_send_wakes_receiver_only_at_isr_exit() {
        let mut k = started_kernel(&[("rx", 4), ("bg", 1)]);
        let rx = k.current_task().unwrap();
        let q = k.create_queue(2, 4).unwrap();
        assert_eq!(
            k.queue_receive(q, Timeout::Forever).unwrap(),
            ReceiveOutcome::Blocked
        );
        let bg = k.current_task().unwrap();

        k.isr_enter();
        let mut y = YieldRequest::new();
        let outcome = k.queue_send_from_isr(q, &item(3)).unwrap();
        assert_eq!(outcome, IsrOutcome::CompletedWokeHigherPriority);
        y.fold(outcome);
        // No switch inside the handler.
        assert_eq!(k.current_task(), Some(bg));
        k.isr_exit(y);
        // Realized at interrupt exit.
        assert_eq!(k.current_task(), Some(rx));
    }

    #[test]
    fn isr_send_on_full_queue_reports_full() {
        let mut k = started_kernel(&[("t", 2)]);
        let q = k.create_queue(1, 4).unwrap();
        let _ = k.queue_send(q, &item(1), Timeout::None).unwrap();
        k.isr_enter();
        assert_eq!(k.queue_send_from_isr(q, &item(2)), Err(RtosError::Full));
        k.isr_exit(YieldRequest::new());
    }

    #[test]
    fn isr_receive_returns_item_and_outcome() {
        let mut k = started_kernel(&[("t", 2)]);
        let q = k.create_queue(2, 4).unwrap();
        let _ = k.queue_send(q, &item(11), Timeout::None).unwrap();
        k.isr_enter();
        let (raw, outcome) = k.queue_receive_from_isr(q).unwrap();
        assert_eq!(value(&raw), 11);
        assert_eq!(outcome, IsrOutcome::Completed);
        assert_eq!(k.queue_receive_from_isr(q), Err(RtosError::Empty));
        k.isr_exit(YieldRequest::new());
    }

    #[test]
    fn peek_leaves_the_item_in_place() {
        let mut k = started_kernel(&[("t", 2)]);
        let q = k.create_queue(2, 4).unwrap();
        let _ = k.queue_send(q, &item(5), Timeout::None).unwrap();
        match k.queue_peek(q, Timeout::None).unwrap() {
            ReceiveOutcome::Received(raw) => assert_eq!(value(&raw), 5),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(k.queue_len(q).unwrap(), 1);
    }

    #[test]
    fn deleting_a_queue_with_waiters_is_rejected() {
        let mut k = started_kernel(&[("t", 3), ("bg", 1)]);
        let q = k.create_queue(1, 4).unwrap();
        assert_eq!(
            k.queue_receive(q, Timeout::Forever).unwrap(),
            ReceiveOutcome::Blocked
        );
        assert_eq!(k.delete_queue(q), Err(RtosError::InvalidOperation));
    }
}
