//! Typed queue handle.
//!
//! Pins a kernel queue to one `Copy` item type and does the byte-level
//! marshalling at the API edge, so application code never sees the raw
//! ring. Items are moved by bitwise copy; types with internal padding
//! ship their padding bytes as-is.

use core::marker::PhantomData;
use core::mem::size_of;

use crate::kernel::Kernel;
use crate::types::{
    IsrOutcome, QueueId, RawItem, ReceiveOutcome, RtosError, SendOutcome, Timeout, WakeResult,
};

/// Outcome of a typed receive that was allowed to block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Receive<T> {
    Received(T),
    Blocked,
}

/// A queue of `T` values.
pub struct Queue<T: Copy> {
    id: QueueId,
    _items: PhantomData<fn(T) -> T>,
}

// The handle carries no T value, only the id.
impl<T: Copy> Clone for Queue<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: Copy> Copy for Queue<T> {}

impl<T: Copy> Queue<T> {
    /// Create a queue holding up to `capacity` values of `T`.
    pub fn new(kernel: &mut Kernel, capacity: usize) -> Result<Self, RtosError> {
        let id = kernel.create_queue(capacity, size_of::<T>())?;
        Ok(Queue {
            id,
            _items: PhantomData,
        })
    }

    /// The underlying kernel handle.
    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn send(
        &self,
        kernel: &mut Kernel,
        item: &T,
        timeout: Timeout,
    ) -> Result<SendOutcome, RtosError> {
        kernel.queue_send(self.id, &encode(item), timeout)
    }

    pub fn send_to_front(
        &self,
        kernel: &mut Kernel,
        item: &T,
        timeout: Timeout,
    ) -> Result<SendOutcome, RtosError> {
        kernel.queue_send_to_front(self.id, &encode(item), timeout)
    }

    pub fn receive(&self, kernel: &mut Kernel, timeout: Timeout) -> Result<Receive<T>, RtosError> {
        match kernel.queue_receive(self.id, timeout)? {
            ReceiveOutcome::Received(raw) => Ok(Receive::Received(decode(&raw))),
            ReceiveOutcome::Blocked => Ok(Receive::Blocked),
        }
    }

    /// Read the front item without consuming it.
    pub fn peek(&self, kernel: &mut Kernel, timeout: Timeout) -> Result<Receive<T>, RtosError> {
        match kernel.queue_peek(self.id, timeout)? {
            ReceiveOutcome::Received(raw) => Ok(Receive::Received(decode(&raw))),
            ReceiveOutcome::Blocked => Ok(Receive::Blocked),
        }
    }

    pub fn send_from_isr(&self, kernel: &mut Kernel, item: &T) -> Result<IsrOutcome, RtosError> {
        kernel.queue_send_from_isr(self.id, &encode(item))
    }

    pub fn send_to_front_from_isr(
        &self,
        kernel: &mut Kernel,
        item: &T,
    ) -> Result<IsrOutcome, RtosError> {
        kernel.queue_send_to_front_from_isr(self.id, &encode(item))
    }

    pub fn receive_from_isr(&self, kernel: &mut Kernel) -> Result<(T, IsrOutcome), RtosError> {
        let (raw, outcome) = kernel.queue_receive_from_isr(self.id)?;
        Ok((decode(&raw), outcome))
    }

    /// Decode the wake result of a blocked receive on this queue.
    /// `TimedOut` for a deadline expiry; `InvalidOperation` for a wake
    /// result that did not come from a receive.
    pub fn decode_wake(&self, result: WakeResult) -> Result<T, RtosError> {
        match result {
            WakeResult::Received(raw) => Ok(decode(&raw)),
            WakeResult::TimedOut(_) => Err(RtosError::TimedOut),
            _ => Err(RtosError::InvalidOperation),
        }
    }

    pub fn len(&self, kernel: &Kernel) -> Result<usize, RtosError> {
        kernel.queue_len(self.id)
    }

    pub fn is_empty(&self, kernel: &Kernel) -> Result<bool, RtosError> {
        Ok(self.len(kernel)? == 0)
    }

    pub fn spaces_available(&self, kernel: &Kernel) -> Result<usize, RtosError> {
        kernel.queue_spaces(self.id)
    }

    pub fn is_full(&self, kernel: &Kernel) -> Result<bool, RtosError> {
        Ok(self.spaces_available(kernel)? == 0)
    }
}

fn encode<T: Copy>(item: &T) -> RawItem {
    let mut bytes = RawItem::new();
    // Safety: T is Copy and sized; reading size_of::<T>() bytes from a
    // live &T is valid. Padding bytes travel as whatever they hold.
    let view = unsafe {
        core::slice::from_raw_parts(item as *const T as *const u8, size_of::<T>())
    };
    let _ = bytes.extend_from_slice(view);
    bytes
}

fn decode<T: Copy>(raw: &[u8]) -> T {
    debug_assert_eq!(raw.len(), size_of::<T>());
    // Safety: the ring stored exactly the bytes of a T placed by encode;
    // read_unaligned tolerates the ring's byte alignment.
    unsafe { core::ptr::read_unaligned(raw.as_ptr() as *const T) }
}
