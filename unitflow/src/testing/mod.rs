//! Testing utilities for unitflow pipelines.
//!
//! This module provides:
//! - Mock units that record, fail, or step
//! - Assertions over plans and unit outcomes
//! - A fixture wiring a catalog, manual clock, and collecting sink

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_plan, assert_runs_before, assert_unit_completed, assert_unit_failed,
    assert_unit_status,
};
pub use fixtures::{run_until_settled, PipelineFixture};
pub use mocks::{ExecutionLog, FailingUnit, FailureStyle, RecordingUnit, SteppedUnit};
