//! Ordered collections used by the scheduler.
//!
//! - `BoundedHeap`: array-backed binary heap with min or max discipline
//! - `OrderedFrontier`: the ready-set used during topological emission

mod frontier;
mod heap;

pub use frontier::{FrontierEntry, OrderedFrontier};
pub use heap::{BoundedHeap, HeapOrder};
