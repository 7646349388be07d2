//! Uniform capability interface over heterogeneous units.

use super::{ExecutionMode, ImmediateStep, StepSequence, Unit, UnitDescriptor};
use crate::core::{Phase, UnitId};
use anyhow::anyhow;
use std::collections::BTreeSet;
use std::sync::Arc;

static NO_CONSTRAINTS: BTreeSet<UnitId> = BTreeSet::new();

/// Wraps a unit together with the descriptor captured at discovery time.
///
/// The scheduler only talks to units through this adapter, so it never needs
/// to know whether a phase body is immediate or stepped.
#[derive(Debug, Clone)]
pub struct UnitLifecycleAdapter {
    unit: Arc<dyn Unit>,
    descriptor: UnitDescriptor,
}

impl UnitLifecycleAdapter {
    /// Resolves the unit's capabilities once.
    #[must_use]
    pub fn new(unit: Arc<dyn Unit>) -> Self {
        let descriptor = unit.descriptor();
        Self { unit, descriptor }
    }

    /// Returns the unit identity.
    #[must_use]
    pub fn id(&self) -> &UnitId {
        &self.descriptor.id
    }

    /// Returns the descriptor captured at discovery.
    #[must_use]
    pub fn descriptor(&self) -> &UnitDescriptor {
        &self.descriptor
    }

    /// Returns true if the unit takes part in the phase.
    #[must_use]
    pub fn participates_in(&self, phase: Phase) -> bool {
        self.descriptor.participates_in(phase)
    }

    /// Returns how the unit runs the phase, or `None` if it does not take part.
    #[must_use]
    pub fn mode(&self, phase: Phase) -> Option<ExecutionMode> {
        self.descriptor.declaration(phase).map(|d| d.mode)
    }

    /// Returns the declared priority for the phase, or `default`.
    #[must_use]
    pub fn priority(&self, phase: Phase, default: i32) -> i32 {
        self.descriptor
            .declaration(phase)
            .and_then(|d| d.priority)
            .unwrap_or(default)
    }

    /// Units this one must run before in the phase.
    #[must_use]
    pub fn run_before(&self, phase: Phase) -> &BTreeSet<UnitId> {
        self.descriptor
            .declaration(phase)
            .map_or(&NO_CONSTRAINTS, |d| &d.run_before)
    }

    /// Units this one must run after in the phase.
    #[must_use]
    pub fn run_after(&self, phase: Phase) -> &BTreeSet<UnitId> {
        self.descriptor
            .declaration(phase)
            .map_or(&NO_CONSTRAINTS, |d| &d.run_after)
    }

    /// Starts the phase body as a step sequence.
    ///
    /// Immediate bodies become a single-step sequence whose only step runs
    /// the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit does not take part in the phase or its
    /// stepped body fails to start.
    pub fn begin(&self, phase: Phase) -> anyhow::Result<Box<dyn StepSequence>> {
        match self.mode(phase) {
            Some(ExecutionMode::Immediate) => {
                Ok(Box::new(ImmediateStep::new(Arc::clone(&self.unit), phase)))
            }
            Some(ExecutionMode::Stepped) => self.unit.begin_phase(phase),
            None => Err(anyhow!("{} does not take part in {phase}", self.id())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{FnStepSequence, FnUnit, PhaseDeclaration, StepOutcome, DEFAULT_PRIORITY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingDescriptorUnit {
        reads: AtomicUsize,
    }

    impl Unit for CountingDescriptorUnit {
        fn descriptor(&self) -> UnitDescriptor {
            self.reads.fetch_add(1, Ordering::SeqCst);
            UnitDescriptor::new("counted")
                .with_phase(Phase::Init, PhaseDeclaration::stepped().with_priority(-2))
        }

        fn begin_phase(&self, _phase: Phase) -> anyhow::Result<Box<dyn StepSequence>> {
            Ok(Box::new(FnStepSequence::new(|step| {
                Ok(if step == 0 { StepOutcome::pending(0.5) } else { StepOutcome::Complete })
            })))
        }
    }

    #[test]
    fn test_descriptor_is_resolved_once() {
        let unit = Arc::new(CountingDescriptorUnit {
            reads: AtomicUsize::new(0),
        });
        let adapter = UnitLifecycleAdapter::new(unit.clone());

        for _ in 0..5 {
            assert_eq!(adapter.priority(Phase::Init, DEFAULT_PRIORITY), -2);
            assert_eq!(adapter.mode(Phase::Init), Some(ExecutionMode::Stepped));
        }
        assert_eq!(unit.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stepped_body_is_driven_through_adapter() {
        let adapter = UnitLifecycleAdapter::new(Arc::new(CountingDescriptorUnit {
            reads: AtomicUsize::new(0),
        }));
        let Ok(mut steps) = adapter.begin(Phase::Init) else {
            panic!("stepped body should start");
        };
        assert_eq!(steps.advance().unwrap(), StepOutcome::Pending { progress: 0.5 });
        assert_eq!(steps.advance().unwrap(), StepOutcome::Complete);
    }

    #[test]
    fn test_immediate_body_is_single_step() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let adapter = UnitLifecycleAdapter::new(Arc::new(FnUnit::new(
            UnitDescriptor::new("fast").with_phase(Phase::LateInit, PhaseDeclaration::immediate()),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )));

        let Ok(mut steps) = adapter.begin(Phase::LateInit) else {
            panic!("immediate body should start");
        };
        assert_eq!(steps.advance().unwrap(), StepOutcome::Complete);
        assert_eq!(steps.advance().unwrap(), StepOutcome::Complete);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_defaults_for_undeclared_phase() {
        let adapter = UnitLifecycleAdapter::new(Arc::new(FnUnit::new(
            UnitDescriptor::new("idle"),
            |_| Ok(()),
        )));

        assert!(!adapter.participates_in(Phase::Init));
        assert_eq!(adapter.priority(Phase::Init, 7), 7);
        assert!(adapter.run_before(Phase::Init).is_empty());
        assert!(adapter.run_after(Phase::Init).is_empty());
        assert!(adapter.begin(Phase::Init).is_err());
    }
}
