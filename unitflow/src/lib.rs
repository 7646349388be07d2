//! # Unitflow
//!
//! Constraint-ordered, time-sliced lifecycle pipeline for loading a dynamic
//! set of extension units into a long-lived host.
//!
//! Unitflow provides:
//!
//! - **Constraint-based scheduling**: per-phase `run_before` / `run_after`
//!   constraints plus priorities, resolved into a deterministic order with
//!   cycle detection
//! - **Resumable staged execution**: the load phases advance one bounded
//!   time slice per host tick
//! - **Failure isolation**: a unit that errors or panics is reported and
//!   skipped while the rest of its phase completes
//! - **Restart on change**: a catalog change mid-load replans from scratch
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use unitflow::prelude::*;
//!
//! let catalog = Arc::new(InMemoryCatalog::new());
//! catalog.insert(Arc::new(FnUnit::new(
//!     UnitDescriptor::new("skins")
//!         .with_phase(Phase::ContentA, PhaseDeclaration::immediate().after("core")),
//!     |phase| { println!("loading skins in {phase}"); Ok(()) },
//! )));
//!
//! let mut pipeline = StagedPipeline::new(catalog, PipelineConfig::default());
//! while !pipeline.tick_default().is_done {
//!     // render a frame
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod catalog;
pub mod collections;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod failure;
pub mod graph;
pub mod observability;
pub mod pipeline;
pub mod testing;
pub mod units;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::catalog::{InMemoryCatalog, UnitCatalog};
    pub use crate::config::UnitflowConfig;
    pub use crate::core::{Phase, PipelineState, UnitId, UnitStatus};
    pub use crate::errors::{
        CyclicGraphError, PlanningError, UnitExecutionError, UnitflowError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::failure::{FailureRecord, FailureReporter};
    pub use crate::graph::DependencyGraph;
    pub use crate::observability::{init_tracing, LoggingConfig};
    pub use crate::pipeline::{
        PipelineConfig, PipelineStatus, RestartDecision, RestartPolicy, SharedPipeline,
        StagedPipeline,
    };
    pub use crate::units::{
        FnUnit, PhaseDeclaration, StepOutcome, StepSequence, Unit, UnitDescriptor,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_covers_the_quick_start() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert(Arc::new(FnUnit::new(
            UnitDescriptor::new("skins")
                .with_phase(Phase::ContentA, PhaseDeclaration::immediate().after("core")),
            |_| Ok(()),
        )));

        let mut pipeline = StagedPipeline::new(catalog, PipelineConfig::default());
        let mut ticks = 0;
        while !pipeline.tick_default().is_done {
            ticks += 1;
            assert!(ticks < 1_000);
        }
        assert_eq!(pipeline.plan(Phase::ContentA), Some(&[UnitId::new("skins")][..]));
    }
}
