//! Ordered queue of pending timer inputs

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

struct Entry<T, I> {
    due: T,
    seq: u64,
    input: I,
}

impl<T: Ord, I> PartialEq for Entry<T, I> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T: Ord, I> Eq for Entry<T, I> {}

impl<T: Ord, I> PartialOrd for Entry<T, I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord, I> Ord for Entry<T, I> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-queue of inputs keyed by due time.
///
/// Inputs with the same due time come out in insertion order.
pub struct Agenda<T, I> {
    heap: BinaryHeap<Reverse<Entry<T, I>>>,
    next_seq: u64,
}

impl<T: Ord + Copy, I> Agenda<T, I> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Queue `input` for delivery at `due`
    pub fn push(&mut self, due: T, input: I) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due, seq, input }));
    }

    /// Due time of the earliest pending input
    pub fn next_due(&self) -> Option<T> {
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    /// Pop the earliest input if it is due at or before `now`
    pub fn pop_due(&mut self, now: T) -> Option<(T, I)> {
        match self.next_due() {
            Some(due) if due <= now => self
                .heap
                .pop()
                .map(|Reverse(entry)| (entry.due, entry.input)),
            _ => None,
        }
    }

    /// Pop the earliest input regardless of its due time
    pub fn pop_next(&mut self) -> Option<(T, I)> {
        self.heap.pop().map(|Reverse(entry)| (entry.due, entry.input))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl<T: Ord + Copy, I> Default for Agenda<T, I> {
    fn default() -> Self {
        Self::new()
    }
}
