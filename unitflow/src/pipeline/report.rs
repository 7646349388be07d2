//! Per-phase outcome bookkeeping.

use super::PhasePlan;
use crate::core::{Phase, UnitId, UnitStatus};
use crate::errors::PlanningError;
use std::collections::BTreeMap;

/// What happened in one phase of one pass.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    /// The phase.
    pub phase: Phase,
    /// The plan, if the phase could be planned.
    pub plan: Option<PhasePlan>,
    /// Why the phase could not be planned.
    pub planning_error: Option<PlanningError>,
    statuses: BTreeMap<UnitId, UnitStatus>,
}

impl PhaseReport {
    /// Creates a report for a planned phase with every unit pending.
    #[must_use]
    pub fn planned(plan: PhasePlan) -> Self {
        let statuses = plan
            .order()
            .iter()
            .map(|id| (id.clone(), UnitStatus::Pending))
            .collect();
        Self {
            phase: plan.phase(),
            plan: Some(plan),
            planning_error: None,
            statuses,
        }
    }

    /// Creates a report for a phase that could not be planned.
    #[must_use]
    pub fn unschedulable(phase: Phase, err: PlanningError) -> Self {
        Self {
            phase,
            plan: None,
            planning_error: Some(err),
            statuses: BTreeMap::new(),
        }
    }

    /// Records a unit's status. Units outside the plan are ignored.
    pub fn set_status(&mut self, unit: &UnitId, status: UnitStatus) {
        if let Some(slot) = self.statuses.get_mut(unit) {
            *slot = status;
        }
    }

    /// Returns a unit's status in this phase.
    #[must_use]
    pub fn status(&self, unit: &UnitId) -> Option<UnitStatus> {
        self.statuses.get(unit).copied()
    }

    /// Returns the units that completed, in identity order.
    #[must_use]
    pub fn completed(&self) -> Vec<&UnitId> {
        self.with_status(UnitStatus::Completed)
    }

    /// Returns the units that failed, in identity order.
    #[must_use]
    pub fn failed(&self) -> Vec<&UnitId> {
        self.with_status(UnitStatus::Failed)
    }

    /// Returns true if the phase could not be planned.
    #[must_use]
    pub fn is_unschedulable(&self) -> bool {
        self.planning_error.is_some()
    }

    /// Returns true if the phase could not be planned because of a cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        matches!(self.planning_error, Some(PlanningError::Cycle { .. }))
    }

    fn with_status(&self, status: UnitStatus) -> Vec<&UnitId> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CyclicGraphError;

    #[test]
    fn test_planned_report_starts_pending() {
        let plan = PhasePlan::new(Phase::Init, vec![UnitId::new("b"), UnitId::new("a")]);
        let mut report = PhaseReport::planned(plan);

        assert_eq!(report.status(&UnitId::new("a")), Some(UnitStatus::Pending));
        assert!(report.completed().is_empty());

        report.set_status(&UnitId::new("a"), UnitStatus::Completed);
        report.set_status(&UnitId::new("b"), UnitStatus::Failed);
        report.set_status(&UnitId::new("ghost"), UnitStatus::Completed);

        assert_eq!(report.completed(), vec![&UnitId::new("a")]);
        assert_eq!(report.failed(), vec![&UnitId::new("b")]);
        assert_eq!(report.status(&UnitId::new("ghost")), None);
        assert!(!report.is_unschedulable());
    }

    #[test]
    fn test_unschedulable_report() {
        let err = PlanningError::Cycle {
            phase: Phase::ContentC,
            source: CyclicGraphError::new(vec!["x".into(), "y".into(), "x".into()]),
        };
        let report = PhaseReport::unschedulable(Phase::ContentC, err);

        assert!(report.is_unschedulable());
        assert!(report.has_cycle());
        assert!(report.plan.is_none());
        assert!(report.failed().is_empty());
    }
}
