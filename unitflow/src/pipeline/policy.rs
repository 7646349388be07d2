//! Host policy consulted after early initialization.

use super::PhaseReport;
use std::fmt;

/// What the host wants after the early-init phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartDecision {
    /// Proceed to init without replanning.
    Continue,
    /// The host process must restart; the pipeline aborts.
    RestartRequired {
        /// Why a restart is needed.
        reason: String,
    },
}

/// Decides whether the host must restart after early init.
pub trait RestartPolicy: Send + Sync {
    /// Inspects the early-init outcome.
    fn after_early_init(&self, report: &PhaseReport) -> RestartDecision;
}

/// Always continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuePolicy;

impl RestartPolicy for ContinuePolicy {
    fn after_early_init(&self, _report: &PhaseReport) -> RestartDecision {
        RestartDecision::Continue
    }
}

/// Requires a restart when any early-init body failed or the phase could
/// not be planned.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestartOnEarlyInitFailure;

impl RestartPolicy for RestartOnEarlyInitFailure {
    fn after_early_init(&self, report: &PhaseReport) -> RestartDecision {
        if let Some(err) = &report.planning_error {
            return RestartDecision::RestartRequired {
                reason: format!("early init unschedulable: {err}"),
            };
        }
        let failed = report.failed();
        if failed.is_empty() {
            RestartDecision::Continue
        } else {
            let names: Vec<&str> = failed.iter().map(|id| id.as_str()).collect();
            RestartDecision::RestartRequired {
                reason: format!("early init failed for {}", names.join(", ")),
            }
        }
    }
}

/// A policy backed by a closure.
pub struct FnRestartPolicy<F>
where
    F: Fn(&PhaseReport) -> RestartDecision + Send + Sync,
{
    func: F,
}

impl<F> FnRestartPolicy<F>
where
    F: Fn(&PhaseReport) -> RestartDecision + Send + Sync,
{
    /// Creates a new closure-backed policy.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnRestartPolicy<F>
where
    F: Fn(&PhaseReport) -> RestartDecision + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRestartPolicy").finish_non_exhaustive()
    }
}

impl<F> RestartPolicy for FnRestartPolicy<F>
where
    F: Fn(&PhaseReport) -> RestartDecision + Send + Sync,
{
    fn after_early_init(&self, report: &PhaseReport) -> RestartDecision {
        (self.func)(report)
    }
}
