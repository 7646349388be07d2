//! Test assertions for pipeline outcomes.

use crate::core::{Phase, UnitId, UnitStatus};
use crate::pipeline::StagedPipeline;

/// Asserts the status a unit reached in a phase of the current pass.
pub fn assert_unit_status(pipeline: &StagedPipeline, phase: Phase, unit: &str, expected: UnitStatus) {
    let actual = pipeline
        .phase_report(phase)
        .and_then(|r| r.status(&UnitId::new(unit)));
    assert_eq!(
        actual,
        Some(expected),
        "Expected {unit} to be {expected} in {phase}, got {actual:?}"
    );
}

/// Asserts that a unit completed a phase.
pub fn assert_unit_completed(pipeline: &StagedPipeline, phase: Phase, unit: &str) {
    assert_unit_status(pipeline, phase, unit, UnitStatus::Completed);
}

/// Asserts that a unit failed a phase.
pub fn assert_unit_failed(pipeline: &StagedPipeline, phase: Phase, unit: &str) {
    assert_unit_status(pipeline, phase, unit, UnitStatus::Failed);
}

/// Asserts the exact planned order of a phase.
pub fn assert_plan(pipeline: &StagedPipeline, phase: Phase, expected: &[&str]) {
    let actual: Option<Vec<&str>> = pipeline
        .plan(phase)
        .map(|order| order.iter().map(UnitId::as_str).collect());
    assert_eq!(
        actual.as_deref(),
        Some(expected),
        "Unexpected plan for {phase}"
    );
}

/// Asserts that `first` appears before `second` in an order.
pub fn assert_runs_before(order: &[UnitId], first: &str, second: &str) {
    let position = |name: &str| order.iter().position(|u| u.as_str() == name);
    match (position(first), position(second)) {
        (Some(a), Some(b)) => assert!(
            a < b,
            "Expected {first} before {second}, got order {order:?}"
        ),
        _ => panic!("Expected both {first} and {second} in order {order:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_before_accepts_correct_order() {
        let order = vec![UnitId::new("a"), UnitId::new("b")];
        assert_runs_before(&order, "a", "b");
    }

    #[test]
    #[should_panic(expected = "Expected b before a")]
    fn test_runs_before_rejects_wrong_order() {
        let order = vec![UnitId::new("a"), UnitId::new("b")];
        assert_runs_before(&order, "b", "a");
    }
}
