//! The resumable staged pipeline.

use super::{
    plan_phase, Clock, ContinuePolicy, MonotonicClock, PhasePlan, PhaseReport, PipelineConfig,
    RestartDecision, RestartPolicy,
};
use crate::catalog::UnitCatalog;
use crate::core::{Phase, PipelineState, UnitId, UnitStatus};
use crate::errors::{PlanningError, UnitExecutionError, UnitflowError};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::failure::{FailureRecord, FailureReporter};
use crate::units::{clamp_fraction, StepOutcome, StepSequence, UnitLifecycleAdapter};
use anyhow::anyhow;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Snapshot of the pipeline returned by every tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    /// Current state.
    pub state: PipelineState,
    /// Phase being executed, if any.
    pub phase: Option<Phase>,
    /// Fraction of the current phase's plan consumed.
    pub phase_progress: f32,
    /// Fraction of the whole load sequence consumed.
    pub overall_progress: f32,
    /// True once every load phase has been consumed.
    pub is_done: bool,
    /// True if the pipeline stopped and the host must restart.
    pub is_aborted: bool,
    /// Current planning pass.
    pub pass_id: Option<Uuid>,
}

struct RunningUnit {
    steps: Box<dyn StepSequence>,
    taken: usize,
    progress: f32,
}

struct ActivePhase {
    order: Vec<UnitId>,
    cursor: usize,
    current: Option<RunningUnit>,
}

impl ActivePhase {
    fn progress(&self) -> f32 {
        if self.order.is_empty() {
            return 1.0;
        }
        let partial = self.current.as_ref().map_or(0.0, |r| r.progress);
        clamp_fraction((self.cursor as f32 + partial) / self.order.len() as f32)
    }
}

/// One catalog snapshot and everything planned from it.
struct Pass {
    id: Uuid,
    revision: u64,
    adapters: Vec<UnitLifecycleAdapter>,
    reports: BTreeMap<Phase, PhaseReport>,
    recurring: BTreeMap<Phase, Result<PhasePlan, PlanningError>>,
    active: Option<ActivePhase>,
}

impl Pass {
    fn adapter(&self, id: &UnitId) -> Option<&UnitLifecycleAdapter> {
        self.adapters.iter().find(|a| a.id() == id)
    }

    fn failure_count(&self) -> usize {
        self.reports.values().map(|r| r.failed().len()).sum()
    }
}

/// Runs a unit body, turning errors and panics into a `UnitExecutionError`.
fn guarded<T>(
    unit: &UnitId,
    phase: Phase,
    body: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, UnitExecutionError> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(UnitExecutionError::raised(unit.clone(), phase, err)),
        Err(payload) => Err(UnitExecutionError::panicked(unit.clone(), phase, payload.as_ref())),
    }
}

/// Drives the unit set through the load phases a time slice at a time.
///
/// The pipeline is single-threaded and cooperative: nothing happens between
/// calls to [`tick`](Self::tick). Each tick does at least one unit of work
/// and stops once the budget is spent, checked after every step.
pub struct StagedPipeline {
    catalog: Arc<dyn UnitCatalog>,
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    policy: Box<dyn RestartPolicy>,
    reporter: FailureReporter,
    state: PipelineState,
    pass: Option<Pass>,
    abort_reason: Option<String>,
}

impl StagedPipeline {
    /// Creates an idle pipeline over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<dyn UnitCatalog>, config: PipelineConfig) -> Self {
        Self {
            catalog,
            config,
            clock: Arc::new(MonotonicClock),
            sink: Arc::new(NoOpEventSink),
            policy: Box::new(ContinuePolicy),
            reporter: FailureReporter::new(),
            state: PipelineState::Idle,
            pass: None,
            abort_reason: None,
        }
    }

    /// Sets the clock used for tick budgets.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the policy consulted after early init.
    #[must_use]
    pub fn with_restart_policy(mut self, policy: impl RestartPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.sink)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Advances the pipeline by one external tick.
    pub fn tick(&mut self, budget: Duration) -> PipelineStatus {
        let started = self.clock.now();
        loop {
            self.check_catalog();
            if self.state.is_terminal() {
                break;
            }
            self.work();
            if self.clock.now().saturating_duration_since(started) >= budget {
                break;
            }
        }
        self.status()
    }

    /// Advances the pipeline by one tick using the configured budget.
    pub fn tick_default(&mut self) -> PipelineStatus {
        self.tick(self.config.tick_budget())
    }

    /// Returns the current status without doing any work.
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        let active = self.pass.as_ref().and_then(|p| p.active.as_ref());
        let phase_progress = match (self.state, active) {
            (PipelineState::Done, _) => 1.0,
            (_, Some(active)) => active.progress(),
            _ => 0.0,
        };
        let completed_phases = match self.state {
            PipelineState::Idle | PipelineState::Discover | PipelineState::Aborted => 0,
            PipelineState::RestartCheck => 1,
            PipelineState::Done => Phase::LOAD_SEQUENCE.len(),
            state => state
                .phase()
                .and_then(|p| Phase::LOAD_SEQUENCE.iter().position(|l| *l == p))
                .unwrap_or(0),
        };
        let overall_progress = if self.state == PipelineState::Done {
            1.0
        } else if self.state.phase().is_some() {
            (completed_phases as f32 + phase_progress) / Phase::LOAD_SEQUENCE.len() as f32
        } else {
            completed_phases as f32 / Phase::LOAD_SEQUENCE.len() as f32
        };

        PipelineStatus {
            state: self.state,
            phase: self.state.phase(),
            phase_progress,
            overall_progress,
            is_done: self.state == PipelineState::Done,
            is_aborted: self.state == PipelineState::Aborted,
            pass_id: self.pass_id(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Returns the current pass identifier.
    #[must_use]
    pub fn pass_id(&self) -> Option<Uuid> {
        self.pass.as_ref().map(|p| p.id)
    }

    /// Returns why the pipeline aborted.
    #[must_use]
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Returns the order planned for a phase in the current pass.
    #[must_use]
    pub fn plan(&self, phase: Phase) -> Option<&[UnitId]> {
        let pass = self.pass.as_ref()?;
        if phase.is_recurring() {
            return pass
                .recurring
                .get(&phase)
                .and_then(|r| r.as_ref().ok())
                .map(PhasePlan::order);
        }
        pass.reports
            .get(&phase)
            .and_then(|r| r.plan.as_ref())
            .map(PhasePlan::order)
    }

    /// Returns true if the phase was refused in the current pass because its
    /// constraints form a cycle.
    #[must_use]
    pub fn has_cycle(&self, phase: Phase) -> bool {
        self.cycle(phase).is_some()
    }

    /// Returns the identities implicated in the phase's cycle, if any.
    #[must_use]
    pub fn cycle(&self, phase: Phase) -> Option<&[String]> {
        let pass = self.pass.as_ref()?;
        let err = if phase.is_recurring() {
            pass.recurring.get(&phase)?.as_ref().err()?
        } else {
            pass.reports.get(&phase)?.planning_error.as_ref()?
        };
        err.cycle_path()
    }

    /// Returns the report for a load phase of the current pass.
    #[must_use]
    pub fn phase_report(&self, phase: Phase) -> Option<&PhaseReport> {
        self.pass.as_ref()?.reports.get(&phase)
    }

    /// Returns every unit failure recorded so far, across passes.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        self.reporter.failures()
    }

    /// Returns the failure reporter.
    #[must_use]
    pub fn reporter(&self) -> &FailureReporter {
        &self.reporter
    }

    /// Registers a callback for unit failures.
    pub fn on_unit_failure<F>(&mut self, callback: F)
    where
        F: Fn(&FailureRecord) + Send + Sync + 'static,
    {
        self.reporter.on_unit_failure(callback);
    }

    /// Discards the current pass and returns to `Idle`.
    ///
    /// The failure log is kept.
    pub fn reset(&mut self) {
        info!(state = %self.state, "Resetting pipeline");
        self.pass = None;
        self.abort_reason = None;
        self.state = PipelineState::Idle;
    }

    /// Runs every unit of a recurring phase to completion, in plan order.
    ///
    /// The plan is computed on first use and cached for the pass.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the phase is not recurring or loading is not
    /// done, and `Planning` if the phase cannot be planned.
    pub fn run_recurring(&mut self, phase: Phase) -> Result<PhaseReport, UnitflowError> {
        if !phase.is_recurring() {
            return Err(UnitflowError::InvalidState(format!(
                "{phase} is not a recurring phase"
            )));
        }
        if self.state != PipelineState::Done {
            return Err(UnitflowError::InvalidState(format!(
                "recurring phases run only once loading is done (state: {})",
                self.state
            )));
        }
        let default_priority = self.config.default_priority;
        let step_limit = self.config.recurring_step_limit;
        let Some(pass) = self.pass.as_mut() else {
            return Err(UnitflowError::InvalidState("no planning pass".to_string()));
        };

        if !pass.recurring.contains_key(&phase) {
            let planned = plan_phase(&pass.adapters, phase, default_priority);
            if let Err(err) = &planned {
                self.reporter.report_phase(err);
            }
            pass.recurring.insert(phase, planned);
        }
        let plan = match pass.recurring.get(&phase) {
            Some(Ok(plan)) => plan.clone(),
            Some(Err(err)) => return Err(err.clone().into()),
            None => return Err(UnitflowError::InvalidState(format!("{phase} was not planned"))),
        };

        let mut report = PhaseReport::planned(plan.clone());
        for id in plan.order() {
            let outcome = match pass.adapter(id) {
                Some(adapter) => run_to_completion(adapter, phase, step_limit),
                None => Err(UnitExecutionError::raised(
                    id.clone(),
                    phase,
                    anyhow!("{id} is missing from the pass snapshot"),
                )),
            };
            match outcome {
                Ok(_) => report.set_status(id, UnitStatus::Completed),
                Err(err) => {
                    self.reporter.report_unit(&err);
                    self.sink.try_emit(&PipelineEvent::UnitFailed {
                        unit: id.clone(),
                        phase,
                        detail: err.detail.clone(),
                    });
                    report.set_status(id, UnitStatus::Failed);
                }
            }
        }
        Ok(report)
    }

    fn check_catalog(&mut self) {
        if !self.config.restart_on_catalog_change {
            return;
        }
        if !(self.state.is_mid_pipeline() || self.state == PipelineState::Done) {
            return;
        }
        let Some(pass) = self.pass.as_ref() else {
            return;
        };
        let revision = self.catalog.revision();
        if revision == pass.revision {
            return;
        }

        info!(
            previous_pass = %pass.id,
            from_revision = pass.revision,
            to_revision = revision,
            state = %self.state,
            "Catalog changed, restarting from discovery"
        );
        self.sink.try_emit(&PipelineEvent::Restarted {
            previous_pass: pass.id,
            revision,
        });
        self.pass = None;
        self.state = PipelineState::Discover;
    }

    /// Performs one unit of work for the current state.
    fn work(&mut self) {
        match self.state {
            PipelineState::Idle => {
                info!("Starting pipeline");
                self.state = PipelineState::Discover;
            }
            PipelineState::Discover => self.discover(),
            PipelineState::RestartCheck => self.restart_check(),
            PipelineState::Done | PipelineState::Aborted => {}
            state => {
                if let Some(phase) = state.phase() {
                    self.work_phase(phase);
                }
            }
        }
    }

    fn discover(&mut self) {
        let revision = self.catalog.revision();
        let units = match self.catalog.current_units() {
            Ok(units) => units,
            Err(err) => {
                self.abort(format!("catalog snapshot failed: {err}"));
                return;
            }
        };

        let adapters: Vec<UnitLifecycleAdapter> =
            units.into_iter().map(UnitLifecycleAdapter::new).collect();
        let id = Uuid::new_v4();
        info!(pass_id = %id, revision, units = adapters.len(), "Catalog snapshot taken");
        self.sink.try_emit(&PipelineEvent::PassStarted {
            pass_id: id,
            revision,
            units: adapters.len(),
        });

        self.pass = Some(Pass {
            id,
            revision,
            adapters,
            reports: BTreeMap::new(),
            recurring: BTreeMap::new(),
            active: None,
        });
        self.state = self.state.next();
    }

    fn restart_check(&mut self) {
        let decision = self
            .pass
            .as_ref()
            .and_then(|p| p.reports.get(&Phase::EarlyInit))
            .map_or(RestartDecision::Continue, |r| self.policy.after_early_init(r));

        match decision {
            RestartDecision::Continue => {
                debug!("Restart policy chose to continue");
                self.state = self.state.next();
            }
            RestartDecision::RestartRequired { reason } => self.abort(reason),
        }
    }

    fn work_phase(&mut self, phase: Phase) {
        let default_priority = self.config.default_priority;
        let Some(pass) = self.pass.as_mut() else {
            self.abort(format!("{phase} entered without a catalog snapshot"));
            return;
        };

        let Some(active) = pass.active.as_mut() else {
            match plan_phase(&pass.adapters, phase, default_priority) {
                Ok(plan) => {
                    info!(phase = %phase, units = plan.len(), digest = plan.digest(), "Phase planned");
                    self.sink.try_emit(&PipelineEvent::PhaseStarted {
                        phase,
                        plan: plan.order().to_vec(),
                        digest: plan.digest().to_string(),
                    });
                    pass.active = Some(ActivePhase {
                        order: plan.order().to_vec(),
                        cursor: 0,
                        current: None,
                    });
                    pass.reports.insert(phase, PhaseReport::planned(plan));
                }
                Err(err) => {
                    self.reporter.report_phase(&err);
                    self.sink.try_emit(&PipelineEvent::PhaseUnschedulable {
                        phase,
                        error: err.to_string(),
                    });
                    pass.reports.insert(phase, PhaseReport::unschedulable(phase, err));
                    self.advance_state();
                }
            }
            return;
        };

        let Some(id) = active.order.get(active.cursor).cloned() else {
            let (completed, failed) = pass
                .reports
                .get(&phase)
                .map_or((0, 0), |r| (r.completed().len(), r.failed().len()));
            info!(phase = %phase, completed, failed, "Phase completed");
            self.sink.try_emit(&PipelineEvent::PhaseCompleted {
                phase,
                completed,
                failed,
            });
            pass.active = None;
            self.advance_state();
            return;
        };

        if active.current.is_none() {
            let started = match pass.adapters.iter().find(|a| a.id() == &id) {
                Some(adapter) => guarded(&id, phase, || adapter.begin(phase)),
                None => Err(UnitExecutionError::raised(
                    id.clone(),
                    phase,
                    anyhow!("{id} is missing from the pass snapshot"),
                )),
            };
            match started {
                Ok(steps) => {
                    debug!(unit = %id, phase = %phase, "Unit started");
                    active.current = Some(RunningUnit {
                        steps,
                        taken: 0,
                        progress: 0.0,
                    });
                    if let Some(report) = pass.reports.get_mut(&phase) {
                        report.set_status(&id, UnitStatus::Running);
                    }
                }
                Err(err) => {
                    active.cursor += 1;
                    self.fail_unit(&err);
                    return;
                }
            }
        }

        let Some(running) = active.current.as_mut() else {
            return;
        };
        match guarded(&id, phase, || running.steps.advance()) {
            Ok(outcome @ StepOutcome::Pending { .. }) => {
                running.taken += 1;
                running.progress = outcome.progress();
            }
            Ok(StepOutcome::Complete) => {
                let steps = running.taken + 1;
                debug!(unit = %id, phase = %phase, steps, "Unit completed");
                active.current = None;
                active.cursor += 1;
                if let Some(report) = pass.reports.get_mut(&phase) {
                    report.set_status(&id, UnitStatus::Completed);
                }
                self.sink.try_emit(&PipelineEvent::UnitCompleted {
                    unit: id,
                    phase,
                    steps,
                });
            }
            Err(err) => {
                active.current = None;
                active.cursor += 1;
                self.fail_unit(&err);
            }
        }
    }

    fn fail_unit(&mut self, err: &UnitExecutionError) {
        if let Some(report) = self
            .pass
            .as_mut()
            .and_then(|p| p.reports.get_mut(&err.phase))
        {
            report.set_status(&err.unit, UnitStatus::Failed);
        }
        self.reporter.report_unit(err);
        self.sink.try_emit(&PipelineEvent::UnitFailed {
            unit: err.unit.clone(),
            phase: err.phase,
            detail: err.detail.clone(),
        });
    }

    fn advance_state(&mut self) {
        let next = self.state.next();
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        if next == PipelineState::Done {
            if let Some(pass) = self.pass.as_ref() {
                let failures = pass.failure_count();
                info!(pass_id = %pass.id, failures, "Pipeline completed");
                self.sink.try_emit(&PipelineEvent::Completed {
                    pass_id: pass.id,
                    failures,
                });
            }
        }
    }

    fn abort(&mut self, reason: String) {
        error!(state = %self.state, reason = %reason, "Pipeline aborted");
        self.sink.try_emit(&PipelineEvent::Aborted {
            reason: reason.clone(),
        });
        if let Some(pass) = self.pass.as_mut() {
            pass.active = None;
        }
        self.abort_reason = Some(reason);
        self.state = PipelineState::Aborted;
    }
}

/// Drives one unit's phase body to completion, bounded by a step limit.
fn run_to_completion(
    adapter: &UnitLifecycleAdapter,
    phase: Phase,
    step_limit: usize,
) -> Result<usize, UnitExecutionError> {
    let id = adapter.id();
    let mut steps = guarded(id, phase, || adapter.begin(phase))?;
    for taken in 1..=step_limit.max(1) {
        if guarded(id, phase, || steps.advance())?.is_complete() {
            return Ok(taken);
        }
    }
    Err(UnitExecutionError::raised(
        id.clone(),
        phase,
        anyhow!("did not complete within {step_limit} steps"),
    ))
}

impl fmt::Debug for StagedPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedPipeline")
            .field("state", &self.state)
            .field("pass_id", &self.pass_id())
            .field("config", &self.config)
            .field("failures", &self.reporter.failures().len())
            .finish_non_exhaustive()
    }
}
