//! Failure records and the reporter that collects them.

use crate::core::{Phase, UnitId};
use crate::errors::{PlanningError, UnitErrorKind, UnitExecutionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A callback invoked for every unit failure.
pub type FailureCallback = Box<dyn Fn(&FailureRecord) + Send + Sync>;

/// Record of one unit failing one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The failing unit.
    pub unit: UnitId,
    /// The phase being executed.
    pub phase: Phase,
    /// How the body failed.
    pub kind: UnitErrorKind,
    /// Rendered error detail.
    pub detail: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a new failure record stamped with the current time.
    #[must_use]
    pub fn new(unit: UnitId, phase: Phase, kind: UnitErrorKind, detail: impl Into<String>) -> Self {
        Self {
            unit,
            phase,
            kind,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

impl From<&UnitExecutionError> for FailureRecord {
    fn from(err: &UnitExecutionError) -> Self {
        Self::new(err.unit.clone(), err.phase, err.kind, err.detail.clone())
    }
}

/// Record of a phase that could not be planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseFailure {
    /// The unschedulable phase.
    pub phase: Phase,
    /// Machine-readable code.
    pub code: String,
    /// Rendered error message.
    pub message: String,
    /// Identities implicated in the failure, best-effort.
    pub implicated: Vec<String>,
    /// How to make the phase schedulable, when known.
    pub fix_hint: Option<String>,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl From<&PlanningError> for PhaseFailure {
    fn from(err: &PlanningError) -> Self {
        let implicated = match err {
            PlanningError::Cycle { source, .. } => source.cycle_path.clone(),
            PlanningError::Duplicate { source, .. } => vec![source.node.clone()],
        };
        Self {
            phase: err.phase(),
            code: err.code().to_string(),
            message: err.to_string(),
            implicated,
            fix_hint: err.fix_hint().map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

/// Collects unit and phase failures and notifies subscribers.
#[derive(Default)]
pub struct FailureReporter {
    failures: Vec<FailureRecord>,
    phase_failures: Vec<PhaseFailure>,
    callbacks: Vec<FailureCallback>,
}

impl FailureReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback invoked for every subsequent unit failure.
    pub fn on_unit_failure<F>(&mut self, callback: F)
    where
        F: Fn(&FailureRecord) + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Records a unit failure and notifies subscribers.
    ///
    /// Panicking subscribers are logged and skipped.
    pub fn report_unit(&mut self, err: &UnitExecutionError) -> &FailureRecord {
        let record = FailureRecord::from(err);
        warn!(
            unit = %record.unit,
            phase = %record.phase,
            kind = %record.kind,
            detail = %record.detail,
            "Unit failed"
        );

        for callback in &self.callbacks {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&record);
            })) {
                warn!("Failure callback panicked: {:?}", e);
            }
        }

        self.failures.push(record);
        &self.failures[self.failures.len() - 1]
    }

    /// Records a phase that could not be planned.
    pub fn report_phase(&mut self, err: &PlanningError) -> &PhaseFailure {
        let failure = PhaseFailure::from(err);
        warn!(
            phase = %failure.phase,
            code = %failure.code,
            fix_hint = ?failure.fix_hint,
            "Phase unschedulable: {}",
            failure.message
        );
        self.phase_failures.push(failure);
        &self.phase_failures[self.phase_failures.len() - 1]
    }

    /// Returns every unit failure, oldest first.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Returns every phase failure, oldest first.
    #[must_use]
    pub fn phase_failures(&self) -> &[PhaseFailure] {
        &self.phase_failures
    }

    /// Returns the unit failures recorded for a phase.
    #[must_use]
    pub fn failures_for_phase(&self, phase: Phase) -> Vec<&FailureRecord> {
        self.failures.iter().filter(|f| f.phase == phase).collect()
    }

    /// Returns true if the unit has failed the phase at least once.
    #[must_use]
    pub fn has_failed(&self, unit: &UnitId, phase: Phase) -> bool {
        self.failures
            .iter()
            .any(|f| f.phase == phase && f.unit == *unit)
    }

    /// Returns true if anything has been recorded.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || !self.phase_failures.is_empty()
    }

    /// Converts the logs to a JSON summary.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "unit_failures": self.failures.len(),
            "phase_failures": self.phase_failures.len(),
            "failures": self.failures,
            "unschedulable": self.phase_failures,
        })
    }
}

impl fmt::Debug for FailureReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureReporter")
            .field("failures", &self.failures.len())
            .field("phase_failures", &self.phase_failures.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
