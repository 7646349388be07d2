//! A pipeline handle that serializes ticks across callers.

use super::{PipelineStatus, StagedPipeline};
use crate::events::PipelineEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Clonable handle to a pipeline guarded by a mutex.
///
/// Only one tick runs at a time; concurrent callers wait their turn.
#[derive(Debug, Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<StagedPipeline>>,
}

impl SharedPipeline {
    /// Wraps a pipeline.
    #[must_use]
    pub fn new(pipeline: StagedPipeline) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// Advances the pipeline by one tick.
    pub fn tick(&self, budget: Duration) -> PipelineStatus {
        self.inner.lock().tick(budget)
    }

    /// Advances the pipeline by one tick with the configured budget.
    pub fn tick_default(&self) -> PipelineStatus {
        self.inner.lock().tick_default()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        self.inner.lock().status()
    }

    /// Runs a closure with exclusive access to the pipeline.
    pub fn with_pipeline<R>(&self, f: impl FnOnce(&mut StagedPipeline) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Ticks on a fixed interval until the pipeline is done or aborted.
    ///
    /// Each tick holds the lock only for the configured budget, so other
    /// callers can inspect the pipeline between ticks. On return a
    /// `DriveFinished` event is awaited on the pipeline's sink with the lock
    /// released.
    pub async fn drive(&self, interval: Duration) -> PipelineStatus {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;
        loop {
            ticker.tick().await;
            ticks += 1;
            let status = self.tick_default();
            if status.is_done || status.is_aborted {
                debug!(ticks, state = %status.state, "Drive finished");
                let sink = self.inner.lock().event_sink();
                sink.emit(PipelineEvent::DriveFinished {
                    ticks,
                    state: status.state,
                })
                .await;
                return status;
            }
        }
    }
}
