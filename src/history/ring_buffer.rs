// src/history/ring_buffer.rs
//
// Fixed-capacity circular buffer. Storage is allocated once; once full,
// each push overwrites the oldest slot and advances the head.

use std::fmt;

pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Index of the oldest element once the buffer has wrapped
    head: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Append a value, returning the evicted oldest value when full.
    /// A zero-capacity buffer stores nothing and hands the value back.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(value);
        }
        if self.slots.len() < self.capacity {
            self.slots.push(value);
            return None;
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], value);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.slots.len() == self.capacity
    }

    /// Element at logical position `index` (0 = oldest)
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.slots.len() {
            return None;
        }
        Some(&self.slots[(self.head + index) % self.slots.len()])
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.slots.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        // Slots from `head` on were written before the wrap
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

impl<T: PartialEq> RingBuffer<T> {
    pub fn contains(&self, value: &T) -> bool {
        self.slots.contains(value)
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy of the contents, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_until_full_then_evicts_oldest() {
        let mut ring = RingBuffer::new(3);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert!(ring.is_full());
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.to_vec(), vec![2, 3, 4]);
        assert_eq!(ring.first(), Some(&2));
        assert_eq!(ring.last(), Some(&4));
    }

    #[test]
    fn test_iter_order_after_wrap() {
        let mut ring = RingBuffer::new(4);
        for v in 1..=6 {
            ring.push(v);
        }
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
        assert_eq!(ring.iter().rev().next(), Some(&6));
    }

    #[test]
    fn test_clear_resets_order() {
        let mut ring = RingBuffer::new(2);
        for v in 0..5 {
            ring.push(v);
        }
        ring.clear();
        assert!(ring.is_empty());
        ring.push(10);
        ring.push(11);
        ring.push(12);
        assert_eq!(ring.to_vec(), vec![11, 12]);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut ring = RingBuffer::new(0);
        assert_eq!(ring.push("x"), Some("x"));
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.last(), None);
    }

    #[test]
    fn test_contains_and_get() {
        let mut ring = RingBuffer::new(2);
        ring.push('a');
        ring.push('b');
        ring.push('c');
        assert!(!ring.contains(&'a'));
        assert!(ring.contains(&'c'));
        assert_eq!(ring.get(0), Some(&'b'));
        assert_eq!(ring.get(1), Some(&'c'));
        assert_eq!(ring.get(2), None);
    }

    proptest! {
        #[test]
        fn test_len_never_exceeds_capacity(cap in 0usize..40, values in prop::collection::vec(any::<i32>(), 0..200)) {
            let mut ring = RingBuffer::new(cap);
            for v in &values {
                ring.push(*v);
                prop_assert!(ring.len() <= cap);
            }
            let keep = values.len().min(cap);
            let expected: Vec<i32> = values[values.len() - keep..].to_vec();
            prop_assert_eq!(ring.to_vec(), expected);
        }
    }
}
