//! Lifecycle phases and pipeline states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A lifecycle phase a unit can participate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Runs before the restart decision point.
    EarlyInit,
    /// Main initialization.
    Init,
    /// First content-injection sub-phase.
    ContentA,
    /// Second content-injection sub-phase.
    ContentB,
    /// Third content-injection sub-phase.
    ContentC,
    /// Runs once all content has been injected.
    LateInit,
    /// Recurring per-tick phase.
    Update,
    /// Recurring fixed-step phase.
    FixedUpdate,
}

impl Phase {
    /// Phases driven by the load pipeline, in execution order.
    pub const LOAD_SEQUENCE: [Self; 6] = [
        Self::EarlyInit,
        Self::Init,
        Self::ContentA,
        Self::ContentB,
        Self::ContentC,
        Self::LateInit,
    ];

    /// Phases the host runs repeatedly once loading is done.
    pub const RECURRING: [Self; 2] = [Self::Update, Self::FixedUpdate];

    /// Every phase.
    pub const ALL: [Self; 8] = [
        Self::EarlyInit,
        Self::Init,
        Self::ContentA,
        Self::ContentB,
        Self::ContentC,
        Self::LateInit,
        Self::Update,
        Self::FixedUpdate,
    ];

    /// Returns true for the per-tick phases.
    #[must_use]
    pub fn is_recurring(self) -> bool {
        matches!(self, Self::Update | Self::FixedUpdate)
    }

    /// Returns the snake_case name used in events and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EarlyInit => "early_init",
            Self::Init => "init",
            Self::ContentA => "content_a",
            Self::ContentB => "content_b",
            Self::ContentC => "content_c",
            Self::LateInit => "late_init",
            Self::Update => "update",
            Self::FixedUpdate => "fixed_update",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state of the load pipeline.
///
/// States advance strictly forward except for `Restart` (back to
/// `Discover`) and an explicit reset (back to `Idle`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// Taking a catalog snapshot and resolving capabilities.
    Discover,
    /// Running the early-init phase.
    EarlyInit,
    /// Consulting the host's restart policy.
    RestartCheck,
    /// Running the init phase.
    Init,
    /// Running the first content phase.
    ContentA,
    /// Running the second content phase.
    ContentB,
    /// Running the third content phase.
    ContentC,
    /// Running the late-init phase.
    LateInit,
    /// Every load phase has been consumed.
    Done,
    /// Terminal failure; the host must restart the process.
    Aborted,
}

impl PipelineState {
    /// Returns the unit phase executed in this state, if any.
    #[must_use]
    pub fn phase(self) -> Option<Phase> {
        match self {
            Self::EarlyInit => Some(Phase::EarlyInit),
            Self::Init => Some(Phase::Init),
            Self::ContentA => Some(Phase::ContentA),
            Self::ContentB => Some(Phase::ContentB),
            Self::ContentC => Some(Phase::ContentC),
            Self::LateInit => Some(Phase::LateInit),
            Self::Idle | Self::Discover | Self::RestartCheck | Self::Done | Self::Aborted => None,
        }
    }

    /// Returns the state that follows this one on the forward path.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Discover,
            Self::Discover => Self::EarlyInit,
            Self::EarlyInit => Self::RestartCheck,
            Self::RestartCheck => Self::Init,
            Self::Init => Self::ContentA,
            Self::ContentA => Self::ContentB,
            Self::ContentB => Self::ContentC,
            Self::ContentC => Self::LateInit,
            Self::LateInit | Self::Done => Self::Done,
            Self::Aborted => Self::Aborted,
        }
    }

    /// Returns true for `Done` and `Aborted`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true while a planning pass is in flight.
    #[must_use]
    pub fn is_mid_pipeline(self) -> bool {
        !matches!(self, Self::Idle | Self::Done | Self::Aborted)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Discover => "discover",
            Self::RestartCheck => "restart_check",
            Self::Done => "done",
            Self::Aborted => "aborted",
            other => return other.phase().map_or(Ok(()), |p| write!(f, "{p}")),
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path_visits_every_load_phase() {
        let mut state = PipelineState::Idle;
        let mut phases = Vec::new();
        while state != PipelineState::Done {
            if let Some(phase) = state.phase() {
                phases.push(phase);
            }
            state = state.next();
        }
        assert_eq!(phases, Phase::LOAD_SEQUENCE.to_vec());
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Aborted.is_terminal());
        assert!(!PipelineState::Init.is_terminal());
        assert_eq!(PipelineState::Aborted.next(), PipelineState::Aborted);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::ContentB.to_string(), "content_b");
        assert_eq!(PipelineState::RestartCheck.to_string(), "restart_check");
    }

    #[test]
    fn test_recurring_phases() {
        assert!(Phase::Update.is_recurring());
        assert!(!Phase::LateInit.is_recurring());
        assert!(Phase::LOAD_SEQUENCE.iter().all(|p| !p.is_recurring()));
    }
}
