//! Event emission for pipeline observability.
//!
//! The pipeline reports its transitions as `PipelineEvent`s to an
//! `EventSink`. Sinks must never fail the caller.

mod event;
mod sink;

pub use event::PipelineEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
