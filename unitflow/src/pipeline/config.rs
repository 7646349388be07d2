//! Pipeline configuration.

use crate::units::DEFAULT_PRIORITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the staged pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wall-clock budget for one `tick_default` call, in milliseconds.
    pub tick_budget_ms: u64,
    /// Priority assumed for units that declare none.
    pub default_priority: i32,
    /// Whether a catalog revision change restarts the pipeline.
    pub restart_on_catalog_change: bool,
    /// Maximum steps a recurring-phase body may take in one run.
    pub recurring_step_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_budget_ms: 16,
            default_priority: DEFAULT_PRIORITY,
            restart_on_catalog_change: true,
            recurring_step_limit: 10_000,
        }
    }
}

impl PipelineConfig {
    /// Creates a new config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-tick budget.
    #[must_use]
    pub fn with_tick_budget_ms(mut self, budget_ms: u64) -> Self {
        self.tick_budget_ms = budget_ms;
        self
    }

    /// Sets the default priority.
    #[must_use]
    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    /// Enables or disables restarts on catalog change.
    #[must_use]
    pub fn with_restart_on_catalog_change(mut self, enabled: bool) -> Self {
        self.restart_on_catalog_change = enabled;
        self
    }

    /// Sets the recurring-phase step limit.
    #[must_use]
    pub fn with_recurring_step_limit(mut self, limit: usize) -> Self {
        self.recurring_step_limit = limit;
        self
    }

    /// Returns the per-tick budget as a duration.
    #[must_use]
    pub fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.tick_budget_ms)
    }
}
