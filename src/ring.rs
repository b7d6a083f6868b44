//! Bounded multi-producer queue with batch pop
//!
//! Backs the inbox. Producers push without blocking; the single consumer
//! (the scheduled worker) drains in FIFO batches. Capacity is fixed at
//! construction; an overflowing push hands the item back to the caller,
//! which decides the drop policy (the process send path dead-letters it).

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

/// Fixed-capacity MPSC queue. Pushes are lock-free and never block.
pub struct RingBuffer<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Push an item, returning it back when the buffer is full.
    pub fn push(&self, item: T) -> Result<(), T> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item)) => Err(item),
            // Both ends live for the buffer's lifetime.
            Err(TrySendError::Disconnected(item)) => Err(item),
        }
    }

    /// Pop up to `max` items in FIFO order. Returns an empty vec when the
    /// buffer is drained. Single-consumer by protocol: only the worker that
    /// won the inbox scheduling CAS may call this.
    pub fn pop_n(&self, max: usize) -> Vec<T> {
        let mut items = Vec::new();
        while items.len() < max {
            match self.rx.try_recv() {
                Ok(item) => items.push(item),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        items
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
