//! Resumable step sequences.

use super::Unit;
use crate::core::Phase;
use std::fmt;
use std::sync::Arc;

/// Result of advancing a step sequence by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// More steps remain.
    Pending {
        /// Fraction of the body done so far, in `[0, 1]`.
        progress: f32,
    },
    /// The body is finished.
    Complete,
}

impl StepOutcome {
    /// A pending outcome with progress clamped to `[0, 1]`.
    #[must_use]
    pub fn pending(progress: f32) -> Self {
        Self::Pending {
            progress: clamp_fraction(progress),
        }
    }

    /// Returns the progress fraction this outcome represents, in `[0, 1]`.
    ///
    /// Out-of-range or NaN values in a hand-built `Pending` are clamped.
    #[must_use]
    pub fn progress(&self) -> f32 {
        match self {
            Self::Pending { progress } => clamp_fraction(*progress),
            Self::Complete => 1.0,
        }
    }

    /// Returns true once the body is finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Clamps a fraction to `[0, 1]`, mapping NaN to zero.
pub(crate) fn clamp_fraction(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A phase body that can be advanced one step at a time.
///
/// The pipeline never preempts mid-step; an implementation decides how much
/// work one `advance` represents.
pub trait StepSequence: Send {
    /// Performs one step of work.
    fn advance(&mut self) -> anyhow::Result<StepOutcome>;
}

/// Runs an immediate phase body as a single-step sequence.
pub struct ImmediateStep {
    unit: Arc<dyn Unit>,
    phase: Phase,
    finished: bool,
}

impl ImmediateStep {
    /// Wraps a unit's synchronous body for a phase.
    #[must_use]
    pub fn new(unit: Arc<dyn Unit>, phase: Phase) -> Self {
        Self {
            unit,
            phase,
            finished: false,
        }
    }
}

impl fmt::Debug for ImmediateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImmediateStep")
            .field("phase", &self.phase)
            .field("finished", &self.finished)
            .finish()
    }
}

impl StepSequence for ImmediateStep {
    fn advance(&mut self) -> anyhow::Result<StepOutcome> {
        if !self.finished {
            self.finished = true;
            self.unit.run_phase(self.phase)?;
        }
        Ok(StepOutcome::Complete)
    }
}

/// A step sequence backed by a closure receiving the zero-based step index.
pub struct FnStepSequence<F>
where
    F: FnMut(usize) -> anyhow::Result<StepOutcome> + Send,
{
    step: usize,
    func: F,
}

impl<F> FnStepSequence<F>
where
    F: FnMut(usize) -> anyhow::Result<StepOutcome> + Send,
{
    /// Creates a new closure-backed sequence.
    pub fn new(func: F) -> Self {
        Self { step: 0, func }
    }
}

impl<F> fmt::Debug for FnStepSequence<F>
where
    F: FnMut(usize) -> anyhow::Result<StepOutcome> + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStepSequence")
            .field("step", &self.step)
            .finish()
    }
}

impl<F> StepSequence for FnStepSequence<F>
where
    F: FnMut(usize) -> anyhow::Result<StepOutcome> + Send,
{
    fn advance(&mut self) -> anyhow::Result<StepOutcome> {
        let outcome = (self.func)(self.step)?;
        self.step += 1;
        Ok(outcome)
    }
}
