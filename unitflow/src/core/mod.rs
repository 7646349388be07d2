//! Core domain model types for unitflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Unit identities
//! - Lifecycle phases and pipeline states
//! - Per-unit execution status

mod identity;
mod phase;
mod status;

pub use identity::UnitId;
pub use phase::{Phase, PipelineState};
pub use status::UnitStatus;
