//! The unit trait and a closure-based implementation.

use super::{StepSequence, UnitDescriptor};
use crate::core::Phase;
use anyhow::anyhow;
use std::fmt::{self, Debug};

/// Trait for loadable extension units.
///
/// A unit declares its capabilities through `descriptor`, which is read once
/// per catalog snapshot. Phases declared `Immediate` are executed through
/// `run_phase`; phases declared `Stepped` through `begin_phase`. Units must
/// tolerate being re-entered after a pipeline restart.
pub trait Unit: Send + Sync + Debug {
    /// Returns the unit's identity and per-phase declarations.
    fn descriptor(&self) -> UnitDescriptor;

    /// Runs an immediate phase body to completion.
    fn run_phase(&self, phase: Phase) -> anyhow::Result<()> {
        Err(anyhow!("{} has no immediate body for {phase}", self.descriptor().id))
    }

    /// Starts a stepped phase body.
    fn begin_phase(&self, phase: Phase) -> anyhow::Result<Box<dyn StepSequence>> {
        Err(anyhow!("{} has no stepped body for {phase}", self.descriptor().id))
    }
}

/// A unit whose immediate phase bodies are a single function.
pub struct FnUnit<F>
where
    F: Fn(Phase) -> anyhow::Result<()> + Send + Sync,
{
    descriptor: UnitDescriptor,
    func: F,
}

impl<F> FnUnit<F>
where
    F: Fn(Phase) -> anyhow::Result<()> + Send + Sync,
{
    /// Creates a new function-based unit.
    pub fn new(descriptor: UnitDescriptor, func: F) -> Self {
        Self { descriptor, func }
    }
}

impl<F> Debug for FnUnit<F>
where
    F: Fn(Phase) -> anyhow::Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUnit")
            .field("id", &self.descriptor.id)
            .finish()
    }
}

impl<F> Unit for FnUnit<F>
where
    F: Fn(Phase) -> anyhow::Result<()> + Send + Sync,
{
    fn descriptor(&self) -> UnitDescriptor {
        self.descriptor.clone()
    }

    fn run_phase(&self, phase: Phase) -> anyhow::Result<()> {
        (self.func)(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::PhaseDeclaration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fn_unit_runs_function() {
        let calls = AtomicUsize::new(0);
        let unit = FnUnit::new(
            UnitDescriptor::new("counter").with_phase(Phase::Init, PhaseDeclaration::immediate()),
            |phase| {
                assert_eq!(phase, Phase::Init);
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        unit.run_phase(Phase::Init).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_stepped_body_is_an_error() {
        let unit = FnUnit::new(UnitDescriptor::new("plain"), |_| Ok(()));
        let Err(err) = unit.begin_phase(Phase::ContentA) else {
            panic!("expected begin_phase to fail");
        };
        assert!(err.to_string().contains("plain has no stepped body for content_a"));
    }
}
