//! Mock units for testing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;

use crate::core::{Phase, UnitId};
use crate::pipeline::ManualClock;
use crate::units::{PhaseDeclaration, StepOutcome, StepSequence, Unit, UnitDescriptor};

/// Shared record of which unit bodies finished, in order.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    entries: Mutex<Vec<(UnitId, Phase)>>,
}

impl ExecutionLog {
    /// Creates an empty shared log.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends an entry.
    pub fn record(&self, unit: &UnitId, phase: Phase) {
        self.entries.lock().push((unit.clone(), phase));
    }

    /// Returns every entry, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<(UnitId, Phase)> {
        self.entries.lock().clone()
    }

    /// Returns the units that finished a phase, in order.
    #[must_use]
    pub fn for_phase(&self, phase: Phase) -> Vec<UnitId> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, p)| *p == phase)
            .map(|(u, _)| u.clone())
            .collect()
    }

    /// Returns how many times a unit finished a phase.
    #[must_use]
    pub fn count(&self, unit: &str, phase: Phase) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(u, p)| u.as_str() == unit && *p == phase)
            .count()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// A unit that records every phase body it runs.
#[derive(Debug)]
pub struct RecordingUnit {
    descriptor: UnitDescriptor,
    log: Arc<ExecutionLog>,
}

impl RecordingUnit {
    /// Creates a recording unit.
    #[must_use]
    pub fn new(descriptor: UnitDescriptor, log: Arc<ExecutionLog>) -> Self {
        Self { descriptor, log }
    }

    /// Creates a unit taking part in each listed phase with no constraints.
    #[must_use]
    pub fn in_phases(id: &str, phases: &[Phase], log: Arc<ExecutionLog>) -> Self {
        let descriptor = phases.iter().fold(UnitDescriptor::new(id), |d, phase| {
            d.with_phase(*phase, PhaseDeclaration::immediate())
        });
        Self::new(descriptor, log)
    }
}

impl Unit for RecordingUnit {
    fn descriptor(&self) -> UnitDescriptor {
        self.descriptor.clone()
    }

    fn run_phase(&self, phase: Phase) -> anyhow::Result<()> {
        self.log.record(&self.descriptor.id, phase);
        Ok(())
    }
}

/// How a [`FailingUnit`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStyle {
    /// Returns an error.
    Raise,
    /// Panics.
    Panic,
}

/// A unit whose every phase body fails.
#[derive(Debug)]
pub struct FailingUnit {
    descriptor: UnitDescriptor,
    style: FailureStyle,
    message: String,
    attempts: AtomicUsize,
}

impl FailingUnit {
    /// Creates a unit that returns an error.
    #[must_use]
    pub fn raising(descriptor: UnitDescriptor, message: impl Into<String>) -> Self {
        Self::new(descriptor, FailureStyle::Raise, message)
    }

    /// Creates a unit that panics.
    #[must_use]
    pub fn panicking(descriptor: UnitDescriptor, message: impl Into<String>) -> Self {
        Self::new(descriptor, FailureStyle::Panic, message)
    }

    fn new(descriptor: UnitDescriptor, style: FailureStyle, message: impl Into<String>) -> Self {
        Self {
            descriptor,
            style,
            message: message.into(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Returns how many times a body was attempted.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail(&self) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.style {
            FailureStyle::Raise => bail!("{}", self.message),
            FailureStyle::Panic => panic!("{}", self.message),
        }
    }
}

impl Unit for FailingUnit {
    fn descriptor(&self) -> UnitDescriptor {
        self.descriptor.clone()
    }

    fn run_phase(&self, _phase: Phase) -> anyhow::Result<()> {
        self.fail()
    }

    fn begin_phase(&self, _phase: Phase) -> anyhow::Result<Box<dyn StepSequence>> {
        self.fail()?;
        bail!("{}", self.message)
    }
}

/// A stepped unit that takes a fixed number of steps per phase.
///
/// Each step can advance a [`ManualClock`] by a fixed cost, which makes
/// tick budgets deterministic in tests. Every `begin_phase` starts over.
#[derive(Debug)]
pub struct SteppedUnit {
    descriptor: UnitDescriptor,
    steps: usize,
    log: Arc<ExecutionLog>,
    clock: Option<(Arc<ManualClock>, Duration)>,
    taken: Arc<AtomicUsize>,
    begins: AtomicUsize,
}

impl SteppedUnit {
    /// Creates a unit taking `steps` steps in one phase.
    #[must_use]
    pub fn new(id: &str, phase: Phase, steps: usize, log: Arc<ExecutionLog>) -> Self {
        Self::with_declaration(id, phase, PhaseDeclaration::stepped(), steps, log)
    }

    /// Creates a unit with a custom declaration for its phase.
    #[must_use]
    pub fn with_declaration(
        id: &str,
        phase: Phase,
        declaration: PhaseDeclaration,
        steps: usize,
        log: Arc<ExecutionLog>,
    ) -> Self {
        Self {
            descriptor: UnitDescriptor::new(id).with_phase(phase, declaration),
            steps: steps.max(1),
            log,
            clock: None,
            taken: Arc::new(AtomicUsize::new(0)),
            begins: AtomicUsize::new(0),
        }
    }

    /// Advances `clock` by `cost` on every step.
    #[must_use]
    pub fn with_step_cost(mut self, clock: Arc<ManualClock>, cost: Duration) -> Self {
        self.clock = Some((clock, cost));
        self
    }

    /// Returns the total number of steps taken across all runs.
    #[must_use]
    pub fn steps_taken(&self) -> usize {
        self.taken.load(Ordering::SeqCst)
    }

    /// Returns how many times a step sequence was started.
    #[must_use]
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }
}

impl Unit for SteppedUnit {
    fn descriptor(&self) -> UnitDescriptor {
        self.descriptor.clone()
    }

    fn begin_phase(&self, phase: Phase) -> anyhow::Result<Box<dyn StepSequence>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountedSteps {
            unit: self.descriptor.id.clone(),
            phase,
            total: self.steps,
            done: 0,
            log: Arc::clone(&self.log),
            clock: self.clock.clone(),
            taken: Arc::clone(&self.taken),
        }))
    }
}

struct CountedSteps {
    unit: UnitId,
    phase: Phase,
    total: usize,
    done: usize,
    log: Arc<ExecutionLog>,
    clock: Option<(Arc<ManualClock>, Duration)>,
    taken: Arc<AtomicUsize>,
}

impl StepSequence for CountedSteps {
    fn advance(&mut self) -> anyhow::Result<StepOutcome> {
        if let Some((clock, cost)) = &self.clock {
            clock.advance(*cost);
        }
        self.done += 1;
        self.taken.fetch_add(1, Ordering::SeqCst);
        if self.done >= self.total {
            self.log.record(&self.unit, self.phase);
            Ok(StepOutcome::Complete)
        } else {
            Ok(StepOutcome::pending(self.done as f32 / self.total as f32))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_unit_logs_runs() {
        let log = ExecutionLog::new();
        let unit = RecordingUnit::in_phases("a", &[Phase::Init, Phase::LateInit], Arc::clone(&log));

        assert!(unit.descriptor().participates_in(Phase::LateInit));
        unit.run_phase(Phase::Init).unwrap();
        assert_eq!(log.count("a", Phase::Init), 1);
        assert_eq!(log.for_phase(Phase::LateInit), Vec::<UnitId>::new());
    }

    #[test]
    fn test_failing_unit_raises() {
        let unit = FailingUnit::raising(UnitDescriptor::new("bad"), "boom");
        let err = unit.run_phase(Phase::Init).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(unit.attempts(), 1);
    }

    #[test]
    fn test_stepped_unit_counts_steps_and_restarts() {
        let log = ExecutionLog::new();
        let clock = Arc::new(ManualClock::new());
        let unit = SteppedUnit::new("s", Phase::ContentA, 3, Arc::clone(&log))
            .with_step_cost(Arc::clone(&clock), Duration::from_millis(2));

        let Ok(mut steps) = unit.begin_phase(Phase::ContentA) else {
            panic!("stepped unit should start");
        };
        assert!(!steps.advance().unwrap().is_complete());
        assert!(!steps.advance().unwrap().is_complete());
        assert!(steps.advance().unwrap().is_complete());

        assert_eq!(unit.steps_taken(), 3);
        assert_eq!(log.count("s", Phase::ContentA), 1);

        let Ok(mut again) = unit.begin_phase(Phase::ContentA) else {
            panic!("stepped unit should restart");
        };
        assert_eq!(again.advance().unwrap().progress(), 1.0 / 3.0);
        assert_eq!(unit.begins(), 2);
    }
}
