//! Builds one phase's plan from the discovered units.

use crate::core::{Phase, UnitId};
use crate::errors::PlanningError;
use crate::graph::DependencyGraph;
use crate::units::UnitLifecycleAdapter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// The materialized order for one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasePlan {
    phase: Phase,
    order: Vec<UnitId>,
    digest: String,
}

impl PhasePlan {
    /// Creates a plan and computes its digest.
    #[must_use]
    pub fn new(phase: Phase, order: Vec<UnitId>) -> Self {
        let digest = digest_order(phase, &order);
        Self {
            phase,
            order,
            digest,
        }
    }

    /// Returns the phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the unit order, first to run first.
    #[must_use]
    pub fn order(&self) -> &[UnitId] {
        &self.order
    }

    /// Returns a short hex digest of the order.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Returns the number of units in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no unit takes part in the phase.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the position of a unit in the plan.
    #[must_use]
    pub fn position(&self, id: &UnitId) -> Option<usize> {
        self.order.iter().position(|u| u == id)
    }
}

fn digest_order(phase: Phase, order: &[UnitId]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phase.as_str().as_bytes());
    for id in order {
        hasher.update([0u8]);
        hasher.update(id.as_str().as_bytes());
    }
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Plans a phase over the units that take part in it.
///
/// Constraints naming units absent from the phase are dropped with a
/// warning. A fresh graph is built on every call.
///
/// # Errors
///
/// Returns `PlanningError::Duplicate` if two units share an identity and
/// `PlanningError::Cycle` if the constraints are unsatisfiable.
pub fn plan_phase(
    adapters: &[UnitLifecycleAdapter],
    phase: Phase,
    default_priority: i32,
) -> Result<PhasePlan, PlanningError> {
    let mut capable: Vec<&UnitLifecycleAdapter> =
        adapters.iter().filter(|a| a.participates_in(phase)).collect();
    capable.sort_by(|a, b| a.id().cmp(b.id()));

    let mut graph = DependencyGraph::new();
    for adapter in &capable {
        graph
            .add_node(adapter.id().clone(), adapter.priority(phase, default_priority))
            .map_err(|source| PlanningError::Duplicate { phase, source })?;
    }

    for adapter in &capable {
        for target in adapter.run_before(phase) {
            add_constraint(&mut graph, phase, adapter.id(), target);
        }
        for target in adapter.run_after(phase) {
            add_constraint(&mut graph, phase, target, adapter.id());
        }
    }

    debug!(
        phase = %phase,
        units = graph.len(),
        edges = graph.edge_count(),
        "Built dependency graph"
    );

    let order: Vec<UnitId> = graph
        .ordered_sequence()
        .map_err(|source| PlanningError::Cycle { phase, source })?
        .collect();

    Ok(PhasePlan::new(phase, order))
}

fn add_constraint(graph: &mut DependencyGraph<UnitId>, phase: Phase, before: &UnitId, after: &UnitId) {
    if let Err(err) = graph.add_edge(before, after) {
        warn!(phase = %phase, "Dropping ordering constraint: {err}");
    }
}
