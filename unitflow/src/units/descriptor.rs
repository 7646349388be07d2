//! Per-unit capability and constraint declarations.

use crate::core::{Phase, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Priority used when a unit does not declare one for a phase.
pub const DEFAULT_PRIORITY: i32 = 0;

/// How a unit implements a phase body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Runs to completion in a single call.
    #[default]
    Immediate,
    /// Runs as a resumable step sequence spread over many ticks.
    Stepped,
}

/// What a unit declares for one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDeclaration {
    /// How the body runs.
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Declared priority; lower values run earlier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Units this one must run before.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub run_before: BTreeSet<UnitId>,
    /// Units this one must run after.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub run_after: BTreeSet<UnitId>,
}

impl PhaseDeclaration {
    /// A phase body that completes in one call.
    #[must_use]
    pub fn immediate() -> Self {
        Self::default()
    }

    /// A phase body driven as a step sequence.
    #[must_use]
    pub fn stepped() -> Self {
        Self {
            mode: ExecutionMode::Stepped,
            ..Self::default()
        }
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Adds a unit this one must run before.
    #[must_use]
    pub fn before(mut self, id: impl Into<UnitId>) -> Self {
        self.run_before.insert(id.into());
        self
    }

    /// Adds a unit this one must run after.
    #[must_use]
    pub fn after(mut self, id: impl Into<UnitId>) -> Self {
        self.run_after.insert(id.into());
        self
    }
}

/// A unit's identity and its per-phase declarations.
///
/// A phase missing from `phases` is one the unit does not take part in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    /// Stable identity.
    pub id: UnitId,
    /// Declarations keyed by phase.
    #[serde(default)]
    pub phases: BTreeMap<Phase, PhaseDeclaration>,
}

impl UnitDescriptor {
    /// Creates a descriptor that takes part in no phase.
    #[must_use]
    pub fn new(id: impl Into<UnitId>) -> Self {
        Self {
            id: id.into(),
            phases: BTreeMap::new(),
        }
    }

    /// Declares participation in a phase.
    #[must_use]
    pub fn with_phase(mut self, phase: Phase, declaration: PhaseDeclaration) -> Self {
        self.phases.insert(phase, declaration);
        self
    }

    /// Returns the declaration for a phase, if the unit takes part in it.
    #[must_use]
    pub fn declaration(&self, phase: Phase) -> Option<&PhaseDeclaration> {
        self.phases.get(&phase)
    }

    /// Returns true if the unit takes part in the phase.
    #[must_use]
    pub fn participates_in(&self, phase: Phase) -> bool {
        self.phases.contains_key(&phase)
    }
}
