//! Structured failure reporting.
//!
//! Unit failures and phase-level planning failures are appended to separate
//! logs and fanned out to subscribers. The logs are never cleared, not even
//! across pipeline restarts.

mod reporter;

pub use reporter::{FailureCallback, FailureRecord, FailureReporter, PhaseFailure};
