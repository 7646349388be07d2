//! Per-unit execution status within a phase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of one unit in one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Scheduled but not started.
    #[default]
    Pending,
    /// The unit's step sequence is in progress.
    Running,
    /// The phase body finished without error.
    Completed,
    /// The phase body raised or panicked.
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl UnitStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_status_is_terminal() {
        assert!(UnitStatus::Completed.is_terminal());
        assert!(UnitStatus::Failed.is_terminal());
        assert!(!UnitStatus::Pending.is_terminal());
        assert!(!UnitStatus::Running.is_terminal());
    }

    #[test]
    fn test_unit_status_serialize() {
        let json = serde_json::to_string(&UnitStatus::Failed).unwrap();
        assert_eq!(json, r#""failed""#);

        let deserialized: UnitStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, UnitStatus::Failed);
    }
}
