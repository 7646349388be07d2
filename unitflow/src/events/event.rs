//! Pipeline event type.

use crate::core::{Phase, PipelineState, UnitId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something observable that happened in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A new planning pass took its catalog snapshot.
    PassStarted {
        /// Identifier of the pass.
        pass_id: Uuid,
        /// Catalog revision the snapshot was taken at.
        revision: u64,
        /// Number of units in the snapshot.
        units: usize,
    },
    /// The catalog changed mid-pipeline and the pass was discarded.
    Restarted {
        /// The discarded pass.
        previous_pass: Uuid,
        /// Revision that triggered the restart.
        revision: u64,
    },
    /// A phase was planned and started.
    PhaseStarted {
        /// The phase.
        phase: Phase,
        /// Planned order.
        plan: Vec<UnitId>,
        /// Digest of the planned order.
        digest: String,
    },
    /// A phase's plan was fully consumed.
    PhaseCompleted {
        /// The phase.
        phase: Phase,
        /// Units that completed.
        completed: usize,
        /// Units that failed.
        failed: usize,
    },
    /// A phase could not be planned and was skipped.
    PhaseUnschedulable {
        /// The phase.
        phase: Phase,
        /// Rendered planning error.
        error: String,
    },
    /// A unit finished its phase body.
    UnitCompleted {
        /// The unit.
        unit: UnitId,
        /// The phase.
        phase: Phase,
        /// Number of steps taken.
        steps: usize,
    },
    /// A unit's phase body failed.
    UnitFailed {
        /// The unit.
        unit: UnitId,
        /// The phase.
        phase: Phase,
        /// Rendered error detail.
        detail: String,
    },
    /// Every load phase has been consumed.
    Completed {
        /// Identifier of the pass.
        pass_id: Uuid,
        /// Total unit failures recorded during the pass.
        failures: usize,
    },
    /// The pipeline stopped and the host must restart.
    Aborted {
        /// Why.
        reason: String,
    },
    /// An async drive loop returned.
    DriveFinished {
        /// Ticks the loop performed.
        ticks: u64,
        /// State the pipeline settled in.
        state: PipelineState,
    },
}

impl PipelineEvent {
    /// Returns the dotted event type (e.g. "phase.started").
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PassStarted { .. } => "pipeline.pass_started",
            Self::Restarted { .. } => "pipeline.restarted",
            Self::PhaseStarted { .. } => "phase.started",
            Self::PhaseCompleted { .. } => "phase.completed",
            Self::PhaseUnschedulable { .. } => "phase.unschedulable",
            Self::UnitCompleted { .. } => "unit.completed",
            Self::UnitFailed { .. } => "unit.failed",
            Self::Completed { .. } => "pipeline.completed",
            Self::Aborted { .. } => "pipeline.aborted",
            Self::DriveFinished { .. } => "pipeline.drive_finished",
        }
    }

    /// Returns the event as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
