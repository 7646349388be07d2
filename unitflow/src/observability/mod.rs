//! Logging setup.
//!
//! The library itself only emits `tracing` events. Hosts that have no
//! subscriber of their own can install one with [`init_tracing`].

use crate::errors::UnitflowError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enables or disables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Builds the filter, preferring `RUST_LOG` when it is set and valid.
    ///
    /// # Errors
    ///
    /// Returns `UnitflowError::Config` if the configured directive is invalid.
    pub fn env_filter(&self) -> Result<EnvFilter, UnitflowError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.filter)
            .map_err(|e| UnitflowError::Config(format!("invalid log filter '{}': {e}", self.filter)))
    }
}

/// Installs a global `tracing` subscriber.
///
/// # Errors
///
/// Returns `UnitflowError::Config` if the filter is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), UnitflowError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| UnitflowError::Config(format!("failed to install subscriber: {e}")))
}
