//! Structured logging and pipeline milestone reporting.

mod format;
mod observer;

pub use format::StructuredLogger;
pub use observer::{Milestone, NoopObserver, PipelineObserver, TracingObserver};
