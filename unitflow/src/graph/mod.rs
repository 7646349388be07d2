//! Dependency graph and ordered emission.
//!
//! A graph is built from scratch for every planning pass and consumed by
//! `ordered_sequence`, so stale edges never survive a catalog change.

mod dependency;

pub use dependency::{DependencyGraph, OrderedSequence};
