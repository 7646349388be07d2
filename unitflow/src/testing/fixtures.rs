//! Test fixtures for pipeline testing.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::InMemoryCatalog;
use crate::events::CollectingEventSink;
use crate::pipeline::{ManualClock, PipelineConfig, PipelineStatus, StagedPipeline};
use crate::units::Unit;

use super::ExecutionLog;

/// A catalog, clock, sink, and log wired together for one test.
#[derive(Debug)]
pub struct PipelineFixture {
    /// The catalog the pipeline reads.
    pub catalog: Arc<InMemoryCatalog>,
    /// Clock used for tick budgets.
    pub clock: Arc<ManualClock>,
    /// Captures every emitted event.
    pub sink: Arc<CollectingEventSink>,
    /// Shared execution log for mock units.
    pub log: Arc<ExecutionLog>,
}

impl PipelineFixture {
    /// Creates an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(InMemoryCatalog::new()),
            clock: Arc::new(ManualClock::new()),
            sink: Arc::new(CollectingEventSink::new()),
            log: ExecutionLog::new(),
        }
    }

    /// Adds a unit to the catalog.
    #[must_use]
    pub fn with_unit(self, unit: impl Unit + 'static) -> Self {
        self.catalog.insert(Arc::new(unit));
        self
    }

    /// Builds a pipeline over the fixture with default config.
    #[must_use]
    pub fn pipeline(&self) -> StagedPipeline {
        self.pipeline_with(PipelineConfig::default())
    }

    /// Builds a pipeline over the fixture.
    #[must_use]
    pub fn pipeline_with(&self, config: PipelineConfig) -> StagedPipeline {
        StagedPipeline::new(Arc::clone(&self.catalog) as _, config)
            .with_clock(Arc::clone(&self.clock) as _)
            .with_event_sink(Arc::clone(&self.sink) as _)
    }
}

impl Default for PipelineFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Ticks until the pipeline is done or aborted.
///
/// # Panics
///
/// Panics if the pipeline is still running after `max_ticks` ticks.
pub fn run_until_settled(pipeline: &mut StagedPipeline, max_ticks: usize) -> PipelineStatus {
    for _ in 0..max_ticks {
        let status = pipeline.tick(Duration::from_secs(3600));
        if status.is_done || status.is_aborted {
            return status;
        }
    }
    panic!(
        "pipeline did not settle within {max_ticks} ticks (state: {})",
        pipeline.state()
    );
}
