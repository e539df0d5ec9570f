//! Pipeline milestones and the observer they are reported to.

use crate::clean::CleanReport;
use crate::error::{DetectorError, SourceError};
use crate::features::ExtractReport;
use crate::normalize::NormalizeReport;
use tracing::{info, warn};

#[derive(Debug)]
pub enum Milestone<'a> {
    SourceRead { source: &'a str, lines: usize },
    SourceUnavailable { source: &'a str, error: &'a SourceError },
    Normalized(&'a NormalizeReport),
    Cleaned(&'a CleanReport),
    Extracted(&'a ExtractReport),
    DetectorFailed(&'a DetectorError),
    Scored { windows: usize, anomalies: usize },
}

pub trait PipelineObserver: Send + Sync {
    fn on_milestone(&self, _milestone: &Milestone<'_>) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Reports milestones as `tracing` events.
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_milestone(&self, milestone: &Milestone<'_>) {
        match milestone {
            Milestone::SourceRead { source, lines } => info!(source, lines, "source read"),
            Milestone::SourceUnavailable { source, error } => {
                warn!(source, error = %error, "source unavailable")
            }
            Milestone::Normalized(r) => info!(
                lines = r.lines,
                structured = r.structured,
                fallback = r.fallback,
                with_timestamp = r.with_timestamp,
                "normalized"
            ),
            Milestone::Cleaned(r) => info!(
                kept = r.kept,
                duplicates = r.duplicates_removed,
                invalid_ips = r.invalid_ips,
                validation_failures = r.validation_failures.len(),
                "cleaned"
            ),
            Milestone::Extracted(r) => info!(
                windows = r.windows_emitted,
                empty_windows = r.empty_windows_skipped,
                untimed = r.untimed_entries,
                "features extracted"
            ),
            Milestone::DetectorFailed(e) => warn!(model = e.model(), error = %e, "detector failed"),
            Milestone::Scored { windows, anomalies } => info!(windows, anomalies, "scored"),
        }
    }
}
