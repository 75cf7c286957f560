//! Fixed-capacity ring used by every channel.

use std::collections::VecDeque;

/// A bounded FIFO that evicts its oldest element on overflow.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> Ring<T> {
    /// Create a ring holding at most `capacity` elements.
    ///
    /// A capacity of zero is raised to one; configuration validation rejects
    /// zero before a ring is ever built.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, returning the evicted oldest value if the ring was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.data.len() >= self.capacity {
            self.data.pop_front()
        } else {
            None
        };
        self.data.push_back(value);
        evicted
    }

    /// Most recently pushed value.
    pub fn latest(&self) -> Option<&T> {
        self.data.back()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the ring holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of values retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.data.iter()
    }

    /// Drop every value.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
