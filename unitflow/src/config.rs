//! Top-level configuration.

use crate::errors::UnitflowError;
use crate::observability::LoggingConfig;
use crate::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};

/// Everything a host can configure, loadable from JSON.
///
/// Missing sections and fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitflowConfig {
    /// Pipeline settings.
    pub pipeline: PipelineConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl UnitflowConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `UnitflowError::Config` if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, UnitflowError> {
        serde_json::from_str(json).map_err(|e| UnitflowError::Config(e.to_string()))
    }

    /// Serializes the configuration as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
