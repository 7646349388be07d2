//! Ready-set for topological emission.

use super::{BoundedHeap, HeapOrder};
use crate::errors::EmptyError;
use std::cmp::Ordering;

/// One ready node waiting in the frontier.
#[derive(Debug, Clone)]
pub struct FrontierEntry<K> {
    /// The node key.
    pub key: K,
    /// Textual identity used as the final tie-break.
    pub label: String,
    /// Declared priority; lower runs earlier.
    pub priority: i32,
    /// Derived pull-forward pressure; higher runs earlier.
    pub order_priority: i64,
}

impl<K> FrontierEntry<K> {
    /// Creates a new frontier entry.
    #[must_use]
    pub fn new(key: K, label: impl Into<String>, priority: i32, order_priority: i64) -> Self {
        Self {
            key,
            label: label.into(),
            priority,
            order_priority,
        }
    }
}

// Two entries only compare equal when every ordering field matches, which
// the graph rules out for distinct nodes because labels are unique.
impl<K> Ord for FrontierEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.order_priority.cmp(&self.order_priority))
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl<K> PartialOrd for FrontierEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> PartialEq for FrontierEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K> Eq for FrontierEntry<K> {}

/// Priority queue of ready nodes.
///
/// Removal order: ascending `priority`, then descending `order_priority`,
/// then ascending label.
#[derive(Debug, Clone)]
pub struct OrderedFrontier<K> {
    heap: BoundedHeap<FrontierEntry<K>>,
}

impl<K: PartialEq> OrderedFrontier<K> {
    /// Creates an empty frontier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BoundedHeap::new(HeapOrder::Min),
        }
    }

    /// Seeds a frontier from a batch of entries.
    #[must_use]
    pub fn from_entries(entries: Vec<FrontierEntry<K>>) -> Self {
        Self {
            heap: BoundedHeap::from_vec(HeapOrder::Min, entries),
        }
    }

    /// Adds a ready entry.
    pub fn add(&mut self, entry: FrontierEntry<K>) {
        self.heap.insert(entry);
    }

    /// Removes the entry that should run next.
    pub fn remove_highest_priority(&mut self) -> Result<FrontierEntry<K>, EmptyError> {
        self.heap.extract_root()
    }

    /// Returns true if an entry with this key is queued.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.heap.iter().any(|entry| entry.key == *key)
    }

    /// Returns the number of queued entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<K: PartialEq> Default for OrderedFrontier<K> {
    fn default() -> Self {
        Self::new()
    }
}
