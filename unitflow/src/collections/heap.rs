//! Array-backed binary heap.
//!
//! Slots are addressed 1-indexed (root at slot 1, children of `i` at `2i`
//! and `2i + 1`); slot `i` lives at `items[i - 1]`.

use crate::errors::EmptyError;

/// Which element sits at the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeapOrder {
    /// Smallest element at the root.
    #[default]
    Min,
    /// Largest element at the root.
    Max,
}

/// A binary heap over a totally ordered element type.
///
/// Not safe for concurrent mutation.
#[derive(Debug, Clone)]
pub struct BoundedHeap<T> {
    order: HeapOrder,
    items: Vec<T>,
}

impl<T: Ord> BoundedHeap<T> {
    /// Creates an empty heap.
    #[must_use]
    pub fn new(order: HeapOrder) -> Self {
        Self {
            order,
            items: Vec::new(),
        }
    }

    /// Builds a heap from an existing collection in O(n).
    #[must_use]
    pub fn from_vec(order: HeapOrder, items: Vec<T>) -> Self {
        let mut heap = Self { order, items };
        for slot in (1..=heap.items.len() / 2).rev() {
            heap.sift_down(slot);
        }
        heap
    }

    /// Returns the heap discipline.
    #[must_use]
    pub fn order(&self) -> HeapOrder {
        self.order
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the heap holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Inserts an element.
    pub fn insert(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len());
    }

    /// Returns the root without removing it.
    pub fn peek(&self) -> Result<&T, EmptyError> {
        self.items.first().ok_or(EmptyError::new("peek"))
    }

    /// Removes and returns the root.
    pub fn extract_root(&mut self) -> Result<T, EmptyError> {
        if self.items.is_empty() {
            return Err(EmptyError::new("extract_root"));
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let root = self.items.pop().ok_or(EmptyError::new("extract_root"))?;
        if !self.items.is_empty() {
            self.sift_down(1);
        }
        Ok(root)
    }

    /// Linear membership test.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.items.iter().any(|candidate| candidate == item)
    }

    /// Iterates the elements in heap (not sorted) order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Drains the heap into a vector in extraction order.
    #[must_use]
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut sorted = Vec::with_capacity(self.items.len());
        while let Ok(item) = self.extract_root() {
            sorted.push(item);
        }
        sorted
    }

    fn at(&self, slot: usize) -> &T {
        &self.items[slot - 1]
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.items.swap(a - 1, b - 1);
    }

    /// Returns true if `a` belongs closer to the root than `b`.
    fn precedes(&self, a: &T, b: &T) -> bool {
        match self.order {
            HeapOrder::Min => a < b,
            HeapOrder::Max => a > b,
        }
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 1 {
            let parent = slot / 2;
            if !self.precedes(self.at(slot), self.at(parent)) {
                break;
            }
            self.swap_slots(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.items.len();
        loop {
            let left = slot * 2;
            if left > len {
                break;
            }
            let right = left + 1;
            let mut best = left;
            if right <= len && self.precedes(self.at(right), self.at(left)) {
                best = right;
            }
            if !self.precedes(self.at(best), self.at(slot)) {
                break;
            }
            self.swap_slots(slot, best);
            slot = best;
        }
    }
}

impl<T: Ord> Default for BoundedHeap<T> {
    fn default() -> Self {
        Self::new(HeapOrder::default())
    }
}
