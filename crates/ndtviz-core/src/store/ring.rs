use std::iter::Chain;
use std::slice;

use serde::{Serialize, Serializer};

/// Iterator over a [`RingBuffer`], oldest first.
pub type Iter<'a, T> = Chain<slice::Iter<'a, T>, slice::Iter<'a, T>>;

/// Fixed-capacity circular buffer with drop-oldest eviction.
///
/// Storage grows up to `capacity` and is then overwritten in place, so a
/// push is O(1) and never reallocates. Iteration is in insertion order.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    /// Index of the oldest element once the buffer is full; 0 before.
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Append `value`, returning the evicted oldest element when full.
    ///
    /// A zero-capacity buffer retains nothing and hands `value` straight back.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(value);
        }
        if self.buf.len() < self.capacity {
            self.buf.push(value);
            return None;
        }
        let slot = self.buf.get_mut(self.head)?;
        let evicted = std::mem::replace(slot, value);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Element at logical position `index` (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.buf.len() {
            return None;
        }
        self.buf.get((self.head + index) % self.buf.len())
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// The two most recent elements as `(previous, current)`.
    pub fn last_two(&self) -> Option<(&T, &T)> {
        let n = self.len();
        if n < 2 {
            return None;
        }
        Some((self.get(n - 2)?, self.get(n - 1)?))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        let (newer, older) = self.buf.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy out in insertion order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Serialize> Serialize for RingBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fills_then_evicts_oldest() {
        let mut ring = RingBuffer::new(3);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert!(ring.is_full());
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.push(5), Some(2));
        assert_eq!(ring.to_vec(), [3, 4, 5]);
        assert_eq!(ring.first(), Some(&3));
        assert_eq!(ring.last(), Some(&5));
        assert_eq!(ring.last_two(), Some((&4, &5)));
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut ring = RingBuffer::new(120);
        for i in 0..1000 {
            ring.push(i);
            assert!(ring.len() <= 120);
        }
        assert_eq!(ring.len(), 120);
        assert_eq!(ring.first(), Some(&880));
        assert_eq!(ring.last(), Some(&999));
        let collected: Vec<_> = ring.iter().copied().collect();
        assert!(collected.windows(2).all(|w| w[0] + 1 == w[1]));
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut ring = RingBuffer::new(0);
        assert_eq!(ring.push("x"), Some("x"));
        assert!(ring.is_empty());
        assert_eq!(ring.last(), None);
    }

    #[test]
    fn clear_resets_order() {
        let mut ring = RingBuffer::new(2);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        ring.clear();
        assert!(ring.is_empty());
        ring.push(9);
        assert_eq!(ring.to_vec(), [9]);
        assert_eq!(ring.last_two(), None);
    }

    #[test]
    fn serializes_in_order() {
        let mut ring = RingBuffer::new(2);
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(serde_json::to_string(&ring).unwrap(), "[2,3]");
    }
}
