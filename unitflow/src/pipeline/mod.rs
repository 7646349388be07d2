//! Phase planning and the staged load pipeline.
//!
//! This module provides:
//! - Per-phase planning over the discovered units
//! - The resumable, time-sliced pipeline state machine
//! - Restart policies, clocks, and configuration
//! - A mutex-guarded handle with a tokio driver

mod clock;
mod config;
mod planner;
mod policy;
mod report;
mod shared;
mod staged;

#[cfg(test)]
mod integration_tests;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::PipelineConfig;
pub use planner::{plan_phase, PhasePlan};
pub use policy::{
    ContinuePolicy, FnRestartPolicy, RestartDecision, RestartOnEarlyInitFailure, RestartPolicy,
};
pub use report::PhaseReport;
pub use shared::SharedPipeline;
pub use staged::{PipelineStatus, StagedPipeline};
