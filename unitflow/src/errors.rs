//! Error types for the unitflow scheduler and pipeline.
//!
//! Structural planning errors (duplicate nodes, cycles) abort only the phase
//! being planned. Unit execution errors are contained at the unit boundary
//! and never escalate past the failure reporter.

use crate::core::{Phase, UnitId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for unitflow operations.
#[derive(Debug, Error)]
pub enum UnitflowError {
    /// A phase could not be planned.
    #[error("{0}")]
    Planning(#[from] PlanningError),

    /// The unit catalog could not produce a snapshot.
    #[error("{0}")]
    Catalog(#[from] CatalogError),

    /// A unit failed while executing a phase body.
    #[error("{0}")]
    UnitExecution(#[from] UnitExecutionError),

    /// The pipeline was asked to do something its current state forbids.
    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Metadata about a planning error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PLAN-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Error raised when the same identity is registered twice in one graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Duplicate node '{node}' in dependency graph")]
pub struct DuplicateNodeError {
    /// Textual form of the duplicated identity.
    pub node: String,
}

impl DuplicateNodeError {
    /// Creates a new duplicate node error.
    #[must_use]
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }
}

/// Error raised when an edge names an identity that is not in the graph.
///
/// Non-fatal: the edge is dropped and planning continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Edge '{before}' -> '{after}' references unknown node '{missing}'")]
pub struct UnknownNodeError {
    /// The node that must run first.
    pub before: String,
    /// The node that must run second.
    pub after: String,
    /// The endpoint that was not registered.
    pub missing: String,
}

/// Error raised when an edge is invalid for reasons other than unknown endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeError {
    /// One of the endpoints is not registered.
    #[error("{0}")]
    UnknownNode(#[from] UnknownNodeError),

    /// The edge would order a node before itself.
    #[error("Node '{0}' cannot be ordered relative to itself")]
    SelfEdge(String),
}

/// Error raised when a dependency graph contains a cycle.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in dependency graph: {}", cycle_path.join(" -> "))]
pub struct CyclicGraphError {
    /// Best-effort path of the nodes forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CyclicGraphError {
    /// Creates a new cyclic graph error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "PLAN-CYCLE",
            format!("Ordering constraints form a cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the runBefore/runAfter declarations in the cycle.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

/// Error raised by a heap or frontier operation on an empty structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Operation '{operation}' on empty heap")]
pub struct EmptyError {
    /// The operation that was attempted.
    pub operation: &'static str,
}

impl EmptyError {
    /// Creates a new empty error.
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

/// Phase-level planning failure.
#[derive(Debug, Clone, Error)]
pub enum PlanningError {
    /// A unit identity appeared twice among the units of one phase.
    #[error("Phase {phase}: {source}")]
    Duplicate {
        /// The phase being planned.
        phase: Phase,
        /// The underlying graph error.
        source: DuplicateNodeError,
    },

    /// The phase's ordering constraints are unsatisfiable.
    #[error("Phase {phase}: {source}")]
    Cycle {
        /// The phase being planned.
        phase: Phase,
        /// The underlying graph error.
        source: CyclicGraphError,
    },
}

impl PlanningError {
    /// Returns the phase that failed to plan.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Duplicate { phase, .. } | Self::Cycle { phase, .. } => *phase,
        }
    }

    /// Returns the identities implicated in a cycle, if this is a cycle error.
    #[must_use]
    pub fn cycle_path(&self) -> Option<&[String]> {
        match self {
            Self::Cycle { source, .. } => Some(&source.cycle_path),
            Self::Duplicate { .. } => None,
        }
    }

    /// Returns a hint for making the phase schedulable, if one is known.
    #[must_use]
    pub fn fix_hint(&self) -> Option<&str> {
        match self {
            Self::Cycle { source, .. } => source.error_info.fix_hint.as_deref(),
            Self::Duplicate { .. } => None,
        }
    }

    /// Returns a short machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Duplicate { .. } => "PLAN-DUPLICATE",
            Self::Cycle { .. } => "PLAN-CYCLE",
        }
    }
}

/// Error raised when the catalog cannot produce a consistent snapshot.
#[derive(Debug, Clone, Error)]
#[error("Catalog error: {message}")]
pub struct CatalogError {
    /// The error message.
    pub message: String,
}

impl CatalogError {
    /// Creates a new catalog error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// How a unit's phase body failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitErrorKind {
    /// The body returned an error.
    Raised,
    /// The body panicked.
    Panicked,
}

impl std::fmt::Display for UnitErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raised => write!(f, "raised"),
            Self::Panicked => write!(f, "panicked"),
        }
    }
}

/// Error raised by a unit's phase body during a step.
#[derive(Debug, Error)]
#[error("Unit '{unit}' failed during {phase} ({kind}): {detail}")]
pub struct UnitExecutionError {
    /// The failing unit.
    pub unit: UnitId,
    /// The phase being executed.
    pub phase: Phase,
    /// How the body failed.
    pub kind: UnitErrorKind,
    /// Rendered error detail.
    pub detail: String,
    /// The original error, when the body returned one.
    #[source]
    pub source: Option<anyhow::Error>,
}

impl UnitExecutionError {
    /// Wraps an error returned by a phase body.
    #[must_use]
    pub fn raised(unit: UnitId, phase: Phase, error: anyhow::Error) -> Self {
        Self {
            unit,
            phase,
            kind: UnitErrorKind::Raised,
            detail: format!("{error:#}"),
            source: Some(error),
        }
    }

    /// Builds an error from a caught panic payload.
    #[must_use]
    pub fn panicked(unit: UnitId, phase: Phase, payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self {
            unit,
            phase,
            kind: UnitErrorKind::Panicked,
            detail,
            source: None,
        }
    }
}
