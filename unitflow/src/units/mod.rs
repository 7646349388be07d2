//! Units and their lifecycle adapter.
//!
//! Units are the extension instances a host loads. Each one declares, once,
//! which phases it takes part in and how; the adapter turns that declaration
//! into a single "drive one step" contract for the scheduler.

mod adapter;
mod descriptor;
mod step;
mod unit;

pub use adapter::UnitLifecycleAdapter;
pub use descriptor::{ExecutionMode, PhaseDeclaration, UnitDescriptor, DEFAULT_PRIORITY};
pub(crate) use step::clamp_fraction;
pub use step::{FnStepSequence, ImmediateStep, StepOutcome, StepSequence};
pub use unit::{FnUnit, Unit};
