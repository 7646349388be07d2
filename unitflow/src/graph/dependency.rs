//! Constraint graph over opaque node identities.
//!
//! An edge `before -> after` is stored with `after` as the parent and
//! `before` as the child. Leaves are therefore the nodes with no
//! prerequisites, and emission walks from leaves to roots so that every
//! prerequisite is yielded before the nodes that depend on it.

use crate::collections::{FrontierEntry, OrderedFrontier};
use crate::errors::{CyclicGraphError, DuplicateNodeError, EdgeError, UnknownNodeError};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt::{self, Display};
use std::hash::Hash;
use tracing::trace;

#[derive(Debug, Clone)]
struct GraphNode<K> {
    key: K,
    label: String,
    priority: i32,
    order_priority: i64,
}

/// A directed graph of "must run before" constraints.
#[derive(Debug, Clone)]
pub struct DependencyGraph<K> {
    nodes: Vec<GraphNode<K>>,
    index: HashMap<K, usize>,
    /// `parents[i]`: nodes that must run after `i`.
    parents: Vec<BTreeSet<usize>>,
    /// `children[i]`: nodes that must run before `i`.
    children: Vec<BTreeSet<usize>>,
}

impl<K> DependencyGraph<K>
where
    K: Clone + Eq + Hash + Display,
{
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Registers a node.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateNodeError` if the identity is already present.
    pub fn add_node(&mut self, key: K, priority: i32) -> Result<(), DuplicateNodeError> {
        if self.index.contains_key(&key) {
            return Err(DuplicateNodeError::new(key.to_string()));
        }
        let slot = self.nodes.len();
        self.nodes.push(GraphNode {
            label: key.to_string(),
            key: key.clone(),
            priority,
            order_priority: 0,
        });
        self.index.insert(key, slot);
        self.parents.push(BTreeSet::new());
        self.children.push(BTreeSet::new());
        Ok(())
    }

    /// Records that `before` must be ordered before `after`.
    ///
    /// Re-adding an existing edge is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `EdgeError::UnknownNode` if either endpoint is unregistered and
    /// `EdgeError::SelfEdge` if both endpoints are the same node. The edge is
    /// not recorded in either case.
    pub fn add_edge(&mut self, before: &K, after: &K) -> Result<(), EdgeError> {
        let unknown = |missing: &K| UnknownNodeError {
            before: before.to_string(),
            after: after.to_string(),
            missing: missing.to_string(),
        };
        let &b = self.index.get(before).ok_or_else(|| unknown(before))?;
        let &a = self.index.get(after).ok_or_else(|| unknown(after))?;
        if a == b {
            return Err(EdgeError::SelfEdge(before.to_string()));
        }
        self.parents[b].insert(a);
        self.children[a].insert(b);
        Ok(())
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.parents.iter().map(BTreeSet::len).sum()
    }

    /// Returns true if the identity is registered.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Nodes with no incoming edges: nothing is constrained to run after them.
    #[must_use]
    pub fn roots(&self) -> Vec<&K> {
        self.select(|i| self.parents[i].is_empty())
    }

    /// Nodes with no outgoing edges: nothing is constrained to run before them.
    #[must_use]
    pub fn leaves(&self) -> Vec<&K> {
        self.select(|i| self.children[i].is_empty())
    }

    /// Returns true if the constraints contain a cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.find_cycle_slots().is_some()
    }

    /// Returns one cycle, in "runs before" order with the first node repeated
    /// at the end. Best-effort: not necessarily a minimal cycle.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<K>> {
        self.find_cycle_slots()
            .map(|slots| slots.into_iter().map(|s| self.nodes[s].key.clone()).collect())
    }

    /// Consumes the graph and returns its emission order.
    ///
    /// # Errors
    ///
    /// Returns `CyclicGraphError` without emitting anything if the graph
    /// contains a cycle.
    pub fn ordered_sequence(mut self) -> Result<OrderedSequence<K>, CyclicGraphError> {
        if let Some(cycle) = self.find_cycle_slots() {
            let labels = cycle.into_iter().map(|s| self.nodes[s].label.clone()).collect();
            return Err(CyclicGraphError::new(labels));
        }

        self.propagate_priorities();

        let seeds = (0..self.nodes.len())
            .filter(|&i| self.children[i].is_empty())
            .map(|i| self.entry(i))
            .collect();

        Ok(OrderedSequence {
            visited: vec![false; self.nodes.len()],
            remaining: self.nodes.len(),
            frontier: OrderedFrontier::from_entries(seeds),
            nodes: self.nodes,
            parents: self.parents,
            children: self.children,
        })
    }

    fn select(&self, keep: impl Fn(usize) -> bool) -> Vec<&K> {
        (0..self.nodes.len())
            .filter(|&i| keep(i))
            .map(|i| &self.nodes[i].key)
            .collect()
    }

    fn entry(&self, slot: usize) -> FrontierEntry<usize> {
        let node = &self.nodes[slot];
        FrontierEntry::new(slot, node.label.clone(), node.priority, node.order_priority)
    }

    fn find_cycle_slots(&self) -> Option<Vec<usize>> {
        let mut visited = vec![false; self.nodes.len()];
        let mut on_stack = vec![false; self.nodes.len()];
        let mut path = Vec::new();

        for start in 0..self.nodes.len() {
            if !visited[start] {
                if let Some(cycle) = self.dfs_cycle(start, &mut visited, &mut on_stack, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        node: usize,
        visited: &mut [bool],
        on_stack: &mut [bool],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        visited[node] = true;
        on_stack[node] = true;
        path.push(node);

        for &next in &self.parents[node] {
            if !visited[next] {
                if let Some(cycle) = self.dfs_cycle(next, visited, on_stack, path) {
                    return Some(cycle);
                }
            } else if on_stack[next] {
                let start = path.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
        }

        path.pop();
        on_stack[node] = false;
        None
    }

    /// Breadth-first from the roots: a node's `order_priority` is the max over
    /// its parents of `parent.order_priority + max(0, node.priority - parent.priority)`.
    /// A node is resolved only after all of its parents are.
    fn propagate_priorities(&mut self) {
        let mut pending: Vec<usize> = self.parents.iter().map(BTreeSet::len).collect();
        let mut queue: VecDeque<usize> = (0..self.nodes.len()).filter(|&i| pending[i] == 0).collect();

        while let Some(node) = queue.pop_front() {
            let own = i64::from(self.nodes[node].priority);
            let resolved = self.parents[node]
                .iter()
                .map(|&p| {
                    let parent = &self.nodes[p];
                    parent.order_priority + (own - i64::from(parent.priority)).max(0)
                })
                .max()
                .unwrap_or(0);
            self.nodes[node].order_priority = resolved;
            trace!(node = %self.nodes[node].label, order_priority = resolved, "resolved order priority");

            for &child in &self.children[node] {
                pending[child] -= 1;
                if pending[child] == 0 {
                    queue.push_back(child);
                }
            }
        }
    }
}

impl<K> Default for DependencyGraph<K>
where
    K: Clone + Eq + Hash + Display,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy emission of a cycle-free graph.
///
/// Finite and not restartable: a fresh graph must be built for every plan.
pub struct OrderedSequence<K> {
    nodes: Vec<GraphNode<K>>,
    parents: Vec<BTreeSet<usize>>,
    children: Vec<BTreeSet<usize>>,
    visited: Vec<bool>,
    frontier: OrderedFrontier<usize>,
    remaining: usize,
}

impl<K: Clone> Iterator for OrderedSequence<K> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.frontier.remove_highest_priority().ok()?;
        let node = entry.key;
        self.visited[node] = true;
        self.remaining = self.remaining.saturating_sub(1);

        for &parent in &self.parents[node] {
            if self.visited[parent] || self.frontier.contains(&parent) {
                continue;
            }
            if self.children[parent].iter().all(|&c| self.visited[c]) {
                let p = &self.nodes[parent];
                self.frontier.add(FrontierEntry::new(
                    parent,
                    p.label.clone(),
                    p.priority,
                    p.order_priority,
                ));
            }
        }

        Some(self.nodes[node].key.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K> fmt::Debug for OrderedSequence<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedSequence")
            .field("remaining", &self.remaining)
            .field("ready", &self.frontier.count())
            .finish()
    }
}
