//! Unbounded FIFO mutation queue.
//!
//! Producers and the flushing consumer never block each other.

use crossbeam_queue::SegQueue;

/// Multi-producer, multi-consumer FIFO of pending mutations.
pub struct MutationQueue<T> {
    items: SegQueue<T>,
}

impl<T> MutationQueue<T> {
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.items.push(item);
    }

    pub fn pop(&self) -> Option<T> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for MutationQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
